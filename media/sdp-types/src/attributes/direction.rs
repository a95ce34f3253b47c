use std::fmt;

/// The direction of the media described by a media description, or of the whole session.
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-6.7)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    #[default]
    SendRecv,
    RecvOnly,
    SendOnly,
    Inactive,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::SendRecv => Direction::SendRecv,
            Direction::RecvOnly => Direction::SendOnly,
            Direction::SendOnly => Direction::RecvOnly,
            Direction::Inactive => Direction::Inactive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::SendRecv => "sendrecv",
            Direction::RecvOnly => "recvonly",
            Direction::SendOnly => "sendonly",
            Direction::Inactive => "inactive",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flip() {
        assert_eq!(Direction::SendRecv.flipped(), Direction::SendRecv);
        assert_eq!(Direction::RecvOnly.flipped(), Direction::SendOnly);
        assert_eq!(Direction::SendOnly.flipped(), Direction::RecvOnly);
        assert_eq!(Direction::Inactive.flipped(), Direction::Inactive);
    }

    #[test]
    fn print() {
        assert_eq!(Direction::SendRecv.to_string(), "sendrecv");
        assert_eq!(Direction::RecvOnly.to_string(), "recvonly");
        assert_eq!(Direction::SendOnly.to_string(), "sendonly");
        assert_eq!(Direction::Inactive.to_string(), "inactive");
    }
}
