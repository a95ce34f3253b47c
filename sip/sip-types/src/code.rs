use std::fmt;
use std::str::FromStr;

type Repr = u16;

/// StatusCode is a representation of an SIP-StatusCode encoded in an u16
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StatusCode(Repr);

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("StatusCode");
        tuple.field(&self.0);
        if let Some(text) = self.text() {
            tuple.field(&text);
        }
        tuple.finish()
    }
}

/// CodeKind represents the kind of SIP-StatusCode for broader StatusCode handling
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CodeKind {
    /// Represents code 100..=199
    Provisional,

    /// Represents code 200..=299
    Success,

    /// Represents code 300..=399
    Redirection,

    /// Represents code 400..=499
    RequestFailure,

    /// Represents code 500..=599
    ServerFailure,

    /// Represents code 600..=699
    GlobalFailure,

    /// Represents all other codes
    Custom,
}

impl StatusCode {
    /// Returns the [CodeKind] of the code
    #[inline]
    pub fn kind(self) -> CodeKind {
        match self.0 {
            100..=199 => CodeKind::Provisional,
            200..=299 => CodeKind::Success,
            300..=399 => CodeKind::Redirection,
            400..=499 => CodeKind::RequestFailure,
            500..=599 => CodeKind::ServerFailure,
            600..=699 => CodeKind::GlobalFailure,
            _ => CodeKind::Custom,
        }
    }

    /// Returns the number that the code represents
    pub fn into_u16(self) -> Repr {
        self.0
    }
}

impl FromStr for StatusCode {
    type Err = <Repr as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StatusCode(Repr::from_str(s)?))
    }
}

impl From<Repr> for StatusCode {
    fn from(r: Repr) -> StatusCode {
        StatusCode(r)
    }
}

macro_rules! codes {
    ($($(#[$comments:meta])* [$code:expr => $name:ident, $text:literal];)*) => {
        impl StatusCode {
            /// Returns the default response-text for a known StatusCode
            pub fn text(self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some($text),)*
                    _ => None
                }
            }

            $(
            $(#[$comments])*
            pub const $name: StatusCode = StatusCode($code);
            )*
        }
    };
}

codes! {
    // ==== PROVISIONAL 1XX ====

    [100 => TRYING, "Trying"];
    [180 => RINGING, "Ringing"];
    [181 => CALL_IS_BEING_FORWARDED, "Call Is Being Forwarded"];
    [182 => QUEUED, "Queued"];
    [183 => SESSION_PROGRESS, "Session Progress"];
    [199 => EARLY_DIALOG_TERMINATED, "Early Dialog Terminated"];

    // ==== SUCCESS 2XX ====

    [200 => OK, "OK"];

    // ==== REDIRECTION 3XX ====

    [300 => MULTIPLE_CHOICES, "Multiple Choices"];
    [301 => MOVED_PERMANENTLY, "Moved Permanently"];
    [302 => MOVED_TEMPORARILY, "Moved Temporarily"];
    [305 => USE_PROXY, "Use Proxy"];
    [380 => ALTERNATIVE_SERVICE, "Alternative Service"];

    // ==== REQUEST FAILURE 4XX ====

    [400 => BAD_REQUEST, "Bad Request"];
    [401 => UNAUTHORIZED, "Unauthorized"];
    [402 => PAYMENT_REQUIRED, "Payment Required"];
    [403 => FORBIDDEN, "Forbidden"];
    [404 => NOT_FOUND, "Not Found"];
    [405 => METHOD_NOT_ALLOWED, "Method Not Allowed"];
    [406 => NOT_ACCEPTABLE, "Not Acceptable"];
    [407 => PROXY_AUTHENTICATION_REQUIRED, "Proxy Authentication Required"];
    [408 => REQUEST_TIMEOUT, "Request Timeout"];
    [410 => GONE, "Gone"];
    [413 => REQUEST_ENTITY_TOO_LARGE, "Request Entity Too Large"];
    [414 => REQUEST_URI_TOO_LONG, "Request-URI Too Long"];
    [415 => UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type"];
    [416 => UNSUPPORTED_URI_SCHEME, "Unsupported URI Scheme"];
    [420 => BAD_EXTENSION, "Bad Extension"];
    [421 => EXTENSION_REQUIRED, "Extension Required"];
    [422 => SESSION_INTERVAL_TOO_SMALL, "Session Interval Too Small"];
    [423 => INTERVAL_TOO_BRIEF, "Interval Too Brief"];
    [480 => TEMPORARILY_UNAVAILABLE, "Temporarily Unavailable"];
    [481 => CALL_OR_TRANSACTION_DOES_NOT_EXIST, "Call/Transaction Does Not Exist"];
    [482 => LOOP_DETECTED, "Loop Detected"];
    [483 => TOO_MANY_HOPS, "Too Many Hops"];
    [484 => ADDRESS_INCOMPLETE, "Address Incomplete"];
    [485 => AMBIGUOUS, "Ambiguous"];
    [486 => BUSY_HERE, "Busy Here"];
    [487 => REQUEST_TERMINATED, "Request Terminated"];
    [488 => NOT_ACCEPTABLE_HERE, "Not Acceptable Here"];
    [491 => REQUEST_PENDING, "Request Pending"];
    [493 => UNDECIPHERABLE, "Undecipherable"];

    // ==== SERVER FAILURE 5XX ====

    [500 => SERVER_INTERNAL_ERROR, "Server Internal Error"];
    [501 => NOT_IMPLMENTED, "Not Implemented"];
    [502 => BAD_GATEWAY, "Bad Gateway"];
    [503 => SERVICE_UNAVAILABLE, "Service Unavailable"];
    [504 => SERVER_TIMEOUT, "Server Time-out"];
    [505 => VERSION_NOT_SUPPORTED, "Version Not Supported"];
    [513 => MESSAGE_TOO_LARGE, "Message Too Large"];

    // ==== GLOBAL FAILURE 6XX ====

    [600 => BUSY_EVERYWHERE, "Busy Everywhere"];
    [603 => DECLINE, "Decline"];
    [604 => DOES_NOT_EXIST_ANYWHERE, "Does Not Exist Anywhere"];
    [606 => NOT_ACCEPTABLE6, "Not Acceptable"];
}
