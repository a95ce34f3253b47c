//! Account-file line grammar: `<sip-uri>[;param=value]*`, one per non-comment line of
//! `~/.callforge/accounts`. The whole line parses as a single [`SipUri`] -- the
//! `;param=value` suffix already is `SipUri`'s own `uri_params` grammar, so there's no
//! second parser to hand-write here.

use std::net::SocketAddr;
use std::time::Duration;

use sip_types::uri::SipUri;
use sip_types::uri::sip::SipUriUserPart;

/// How an account answers an incoming call once a `CallIncoming` event is raised for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Never answer automatically; the operator (or a module) decides per call.
    Manual,
    /// Answer immediately once the call is offered.
    Auto,
    /// Answer after a short ring, for modules that want to play an announcement first.
    AutoDelayed,
}

impl Default for AnswerMode {
    fn default() -> Self {
        Self::Manual
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccountParseError {
    #[error("invalid account line: {0}")]
    Uri(#[from] anyhow::Error),
    #[error("account line has no user part in its AOR")]
    MissingUser,
    #[error("invalid value for ;{param}: {value:?}")]
    InvalidParam { param: &'static str, value: String },
}

/// One parsed line of the accounts file: an address-of-record plus the registration,
/// media and routing parameters that go with it.
#[derive(Debug, Clone)]
pub struct Account {
    /// Address-of-record, stripped of password and account-file parameters -- this is
    /// what's compared against an incoming request's `To` header and used to build the
    /// default `From`/registrar target when no `;outbound` is given.
    pub aor: SipUri,
    pub display_name: Option<String>,

    pub auth_user: String,
    pub auth_pass: String,

    pub outbound: Option<SipUri>,
    pub outbound2: Option<SipUri>,

    pub regint: Duration,
    pub fbregint: Duration,
    pub pubint: Option<Duration>,
    pub regq: Option<f32>,

    pub sipnat: bool,
    pub mediaenc: Option<String>,
    pub medianat: Option<String>,
    pub ptime: Duration,
    pub audio_codecs: Vec<String>,
    pub video_codecs: Vec<String>,
    pub stunserver: Option<SocketAddr>,

    pub answermode: AnswerMode,
    /// Registration priority for serial-registration mode; lower registers first.
    pub prio: u32,
}

const DEFAULT_REGINT: Duration = Duration::from_secs(3600);
const DEFAULT_FBREGINT: Duration = Duration::from_secs(120);
const DEFAULT_PTIME: Duration = Duration::from_millis(20);

impl Account {
    /// Parses one accounts-file line. Blank lines and lines starting with `#` are the
    /// caller's concern (see [`parse_accounts`]), not this function's.
    pub fn parse(line: &str) -> Result<Self, AccountParseError> {
        let uri: SipUri = line.trim().parse()?;

        let (auth_user_from_uri, auth_pass_from_uri) = match &uri.user_part {
            SipUriUserPart::Empty => (None, None),
            SipUriUserPart::User(user) => (Some(user.to_string()), None),
            SipUriUserPart::UserPw(user_pw) => {
                (Some(user_pw.user.to_string()), Some(user_pw.password.to_string()))
            }
        };

        let auth_user = string_param(&uri, "auth_user")
            .or(auth_user_from_uri)
            .ok_or(AccountParseError::MissingUser)?;
        let auth_pass = string_param(&uri, "auth_pass")
            .or(auth_pass_from_uri)
            .unwrap_or_default();

        let aor = SipUri::new(uri.host_port.clone())
            .sips(uri.sips)
            .user(auth_user.clone().into());

        let outbound = uri_param(&uri, "outbound")?;
        let outbound2 = uri_param(&uri, "outbound2")?;

        let regint = duration_secs_param(&uri, "regint")?.unwrap_or(DEFAULT_REGINT);
        let fbregint = duration_secs_param(&uri, "fbregint")?.unwrap_or(DEFAULT_FBREGINT);
        let pubint = duration_secs_param(&uri, "pubint")?;
        let regq = float_param(&uri, "regq")?;

        let sipnat = bool_param(&uri, "sipnat")?.unwrap_or(false);
        let mediaenc = string_param(&uri, "mediaenc");
        let medianat = string_param(&uri, "medianat");
        let ptime = duration_millis_param(&uri, "ptime")?.unwrap_or(DEFAULT_PTIME);
        let audio_codecs = list_param(&uri, "audio_codecs");
        let video_codecs = list_param(&uri, "video_codecs");
        let stunserver = socket_addr_param(&uri, "stunserver")?;

        let answermode = match string_param(&uri, "answermode").as_deref() {
            None => AnswerMode::Manual,
            Some("manual") => AnswerMode::Manual,
            Some("auto") => AnswerMode::Auto,
            Some("autodelayed") => AnswerMode::AutoDelayed,
            Some(other) => {
                return Err(AccountParseError::InvalidParam {
                    param: "answermode",
                    value: other.to_owned(),
                });
            }
        };
        let prio = match string_param(&uri, "prio") {
            None => 0,
            Some(value) => value.parse().map_err(|_| AccountParseError::InvalidParam {
                param: "prio",
                value,
            })?,
        };

        Ok(Self {
            aor,
            display_name: None,
            auth_user,
            auth_pass,
            outbound,
            outbound2,
            regint,
            fbregint,
            pubint,
            regq,
            sipnat,
            mediaenc,
            medianat,
            ptime,
            audio_codecs,
            video_codecs,
            stunserver,
            answermode,
            prio,
        })
    }

    /// The target a registration / initial connection should be sent to: the first
    /// configured outbound proxy, falling back to the AOR's own host.
    pub fn registrar(&self) -> &SipUri {
        self.outbound.as_ref().unwrap_or(&self.aor)
    }
}

/// Parses every non-comment, non-blank line of an accounts file.
pub fn parse_accounts(contents: &str) -> Result<Vec<Account>, AccountParseError> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Account::parse)
        .collect()
}

fn string_param(uri: &SipUri, name: &str) -> Option<String> {
    uri.uri_params.get_val(name).map(|v| v.to_string())
}

fn uri_param(uri: &SipUri, name: &str) -> Result<Option<SipUri>, AccountParseError> {
    match uri.uri_params.get_val(name) {
        None => Ok(None),
        Some(value) => {
            let parsed: SipUri = value.as_str().parse().map_err(AccountParseError::Uri)?;
            Ok(Some(parsed))
        }
    }
}

fn duration_secs_param(uri: &SipUri, name: &'static str) -> Result<Option<Duration>, AccountParseError> {
    match string_param(uri, name) {
        None => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map(Some)
            .map_err(|_| AccountParseError::InvalidParam { param: name, value }),
    }
}

fn duration_millis_param(uri: &SipUri, name: &'static str) -> Result<Option<Duration>, AccountParseError> {
    match string_param(uri, name) {
        None => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_millis)
            .map(Some)
            .map_err(|_| AccountParseError::InvalidParam { param: name, value }),
    }
}

fn float_param(uri: &SipUri, name: &'static str) -> Result<Option<f32>, AccountParseError> {
    match string_param(uri, name) {
        None => Ok(None),
        Some(value) => value
            .parse::<f32>()
            .map(Some)
            .map_err(|_| AccountParseError::InvalidParam { param: name, value }),
    }
}

fn bool_param(uri: &SipUri, name: &'static str) -> Result<Option<bool>, AccountParseError> {
    match string_param(uri, name) {
        None => Ok(None),
        Some(value) => match value.as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            _ => Err(AccountParseError::InvalidParam { param: name, value }),
        },
    }
}

fn socket_addr_param(uri: &SipUri, name: &'static str) -> Result<Option<SocketAddr>, AccountParseError> {
    match string_param(uri, name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AccountParseError::InvalidParam { param: name, value }),
    }
}

fn list_param(uri: &SipUri, name: &str) -> Vec<String> {
    match uri.uri_params.get_val(name) {
        None => Vec::new(),
        Some(value) => value.split(',').map(str::trim).map(str::to_owned).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_aor() {
        let account = Account::parse("sip:alice@example.com").unwrap();
        assert_eq!(account.auth_user, "alice");
        assert_eq!(account.regint, DEFAULT_REGINT);
        assert_eq!(account.answermode, AnswerMode::Manual);
        assert_eq!(account.prio, 0);
    }

    #[test]
    fn parses_embedded_credentials() {
        let account = Account::parse("sip:alice:hunter2@example.com").unwrap();
        assert_eq!(account.auth_user, "alice");
        assert_eq!(account.auth_pass, "hunter2");
    }

    #[test]
    fn explicit_auth_params_override_embedded_credentials() {
        let account =
            Account::parse("sip:alice:hunter2@example.com;auth_user=alice2;auth_pass=swordfish")
                .unwrap();
        assert_eq!(account.auth_user, "alice2");
        assert_eq!(account.auth_pass, "swordfish");
    }

    #[test]
    fn parses_full_parameter_set() {
        let account = Account::parse(
            "sip:bob@example.com;regint=600;fbregint=30;prio=1;answermode=auto;\
             audio_codecs=PCMU,PCMA;stunserver=127.0.0.1:3478;sipnat=true",
        )
        .unwrap();

        assert_eq!(account.regint, Duration::from_secs(600));
        assert_eq!(account.fbregint, Duration::from_secs(30));
        assert_eq!(account.prio, 1);
        assert_eq!(account.answermode, AnswerMode::Auto);
        assert_eq!(account.audio_codecs, vec!["PCMU", "PCMA"]);
        assert!(account.sipnat);
        assert_eq!(
            account.stunserver,
            Some("127.0.0.1:3478".parse().unwrap())
        );
    }

    #[test]
    fn rejects_unknown_answermode() {
        let err = Account::parse("sip:bob@example.com;answermode=bogus").unwrap_err();
        assert!(matches!(err, AccountParseError::InvalidParam { param: "answermode", .. }));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let accounts = parse_accounts(
            "# primary line\n\nsip:alice@example.com\n  # indented comment\nsip:bob@example.com\n",
        )
        .unwrap();
        assert_eq!(accounts.len(), 2);
    }
}
