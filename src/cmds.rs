use crate::base::DecodeError;
use std::fmt;

/// Access level requested at login ("authorized client").
pub const NAV350_ACCESS_LEVEL_AUTHORIZED: u8 = 3;

/// Password hash of the "authorized client" user level.
pub const NAV350_AUTHORIZED_PASSWORD_HASH: &str = "F4724744";

/// CoLa-A telegram families used by the NAV350.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// Read a variable by name (`sRN`), answered with `sRA`.
    ReadByName,
    /// Write a variable by name (`sWN`), answered with `sWA`.
    WriteByName,
    /// Invoke a method by name (`sMN`), answered with `sAN`.
    MethodByName,
}

impl ServiceType {
    /// Token sent in requests.
    pub const fn request_token(self) -> &'static str {
        match self {
            ServiceType::ReadByName => "sRN",
            ServiceType::WriteByName => "sWN",
            ServiceType::MethodByName => "sMN",
        }
    }

    /// Token the device uses in the matching reply.
    pub const fn reply_token(self) -> &'static str {
        match self {
            ServiceType::ReadByName => "sRA",
            ServiceType::WriteByName => "sWA",
            ServiceType::MethodByName => "sAN",
        }
    }

    /// Looks up a request token.
    pub fn from_request_token(token: &str) -> Option<ServiceType> {
        match token {
            "sRN" => Some(ServiceType::ReadByName),
            "sWN" => Some(ServiceType::WriteByName),
            "sMN" => Some(ServiceType::MethodByName),
            _ => None,
        }
    }
}

/// Every device command the driver issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    /// Log in with a user level and password hash.
    SetAccessMode,
    /// Read part number, version and name.
    DeviceIdent,
    /// Switch the operating mode (power down, standby, mapping, landmark detection, navigation).
    ChangeState,
    /// Send the current vehicle velocity for pose prediction.
    SetSpeed,
    /// Request pose, reflector and scan data in navigation mode.
    PosGetData,
    /// Request reflector and scan data in landmark detection mode.
    LmdGetData,
    /// Run a mapping sweep.
    DoMapping,
    /// Configure the mapping run.
    MapConfig,
    /// Select the active layer.
    CurrentLayer,
    /// Configure the reflector type for landmark detection.
    ReflectorType,
    /// Configure the reflector size for landmark detection.
    ReflectorSize,
    /// Add landmarks to the layout.
    AddLandmark,
}

impl CommandId {
    /// All commands, in table order.
    pub const ALL: [CommandId; 12] = [
        CommandId::SetAccessMode,
        CommandId::DeviceIdent,
        CommandId::ChangeState,
        CommandId::SetSpeed,
        CommandId::PosGetData,
        CommandId::LmdGetData,
        CommandId::DoMapping,
        CommandId::MapConfig,
        CommandId::CurrentLayer,
        CommandId::ReflectorType,
        CommandId::ReflectorSize,
        CommandId::AddLandmark,
    ];

    pub const fn service(self) -> ServiceType {
        match self {
            CommandId::DeviceIdent => ServiceType::ReadByName,
            CommandId::MapConfig
            | CommandId::CurrentLayer
            | CommandId::ReflectorType
            | CommandId::ReflectorSize => ServiceType::WriteByName,
            CommandId::SetAccessMode
            | CommandId::ChangeState
            | CommandId::SetSpeed
            | CommandId::PosGetData
            | CommandId::LmdGetData
            | CommandId::DoMapping
            | CommandId::AddLandmark => ServiceType::MethodByName,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CommandId::SetAccessMode => "SetAccessMode",
            CommandId::DeviceIdent => "DeviceIdent",
            CommandId::ChangeState => "mNEVAChangeState",
            CommandId::SetSpeed => "mNPOSSetSpeed",
            CommandId::PosGetData => "mNPOSGetData",
            CommandId::LmdGetData => "mNLMDGetData",
            CommandId::DoMapping => "mNMAPDoMapping",
            CommandId::MapConfig => "NMAPMapCfg",
            CommandId::CurrentLayer => "NEVACurrLayer",
            CommandId::ReflectorType => "NLMDReflType",
            CommandId::ReflectorSize => "NLMDReflSize",
            CommandId::AddLandmark => "mNLAYAddLandmark",
        }
    }

    /// Header of the reply, e.g. `sAN mNPOSGetData`.
    pub fn reply_prefix(self) -> String {
        format!("{} {}", self.service().reply_token(), self.name())
    }

    /// Starts a request for this command.
    pub fn command(self) -> Command {
        Command::new(self.service(), self.name())
    }
}

/// One request telegram: service token, command name and argument tokens.
///
/// # Example
/// ```rust
/// # use nav350::cmds::{Command, CommandId};
/// let cmd = CommandId::SetSpeed.command().signed(250).signed(-10).signed(0).signed(1200).unsigned(0u8);
/// assert_eq!(cmd.to_payload(), b"sMN mNPOSSetSpeed +250 -10 +0 +1200 0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    service: ServiceType,
    name: String,
    args: Vec<String>,
}

impl Command {
    pub fn new(service: ServiceType, name: &str) -> Command {
        Command {
            service,
            name: name.to_owned(),
            args: Vec::new(),
        }
    }

    /// Appends a pre-formatted argument token.
    pub fn arg(mut self, token: impl Into<String>) -> Command {
        self.args.push(token.into());
        self
    }

    /// Appends a signed decimal argument, `+` included for non-negative values.
    pub fn signed(self, value: i32) -> Command {
        self.arg(format!("{:+}", value))
    }

    /// Appends an unsigned decimal argument.
    pub fn unsigned(self, value: impl Into<u32>) -> Command {
        self.arg(value.into().to_string())
    }

    pub fn service(&self) -> ServiceType {
        self.service
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Header the device's answer starts with.
    pub fn expected_reply(&self) -> String {
        format!("{} {}", self.service.reply_token(), self.name)
    }

    /// The request text without framing.
    pub fn to_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parses request text back into a command.
    ///
    /// Fails if the first token is not a request service token or the name is missing.
    pub fn parse(payload: &[u8]) -> Result<Command, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidText)?;
        let mut tokens = text.split(' ').filter(|token| !token.is_empty());
        let service_token = tokens.next().ok_or(DecodeError::Truncated { index: 0, len: 0 })?;
        let service = ServiceType::from_request_token(service_token).ok_or_else(|| {
            DecodeError::UnexpectedToken {
                index: 0,
                expected: "sRN, sWN or sMN".to_owned(),
                found: service_token.to_owned(),
            }
        })?;
        let name = tokens.next().ok_or(DecodeError::Truncated { index: 1, len: 1 })?;
        Ok(Command {
            service,
            name: name.to_owned(),
            args: tokens.map(str::to_owned).collect(),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.service.request_token(), self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::tokens::tokenize;

    #[test]
    fn reply_prefixes_follow_service_type() {
        assert_eq!(CommandId::DeviceIdent.reply_prefix(), "sRA DeviceIdent");
        assert_eq!(CommandId::CurrentLayer.reply_prefix(), "sWA NEVACurrLayer");
        assert_eq!(CommandId::PosGetData.reply_prefix(), "sAN mNPOSGetData");
        for id in CommandId::ALL {
            assert_eq!(id.command().expected_reply(), id.reply_prefix());
        }
    }

    #[test]
    fn signed_arguments_carry_explicit_sign() {
        let cmd = CommandId::MapConfig
            .command()
            .unsigned(50u8)
            .unsigned(0u8)
            .signed(0)
            .signed(-1500)
            .signed(90000);
        assert_eq!(cmd.to_payload(), b"sWN NMAPMapCfg 50 0 +0 -1500 +90000");
    }

    #[test]
    fn command_round_trips_through_payload() {
        let cmd = CommandId::AddLandmark
            .command()
            .unsigned(1u8)
            .signed(1000)
            .signed(-2000)
            .unsigned(1u8)
            .unsigned(1u8)
            .unsigned(80u8)
            .unsigned(0u8)
            .unsigned(7u8);
        let payload = cmd.to_payload();
        let parsed = Command::parse(&payload).unwrap();
        assert_eq!(parsed, cmd);

        let tokens = tokenize(&payload).unwrap();
        assert_eq!(&tokens[2..], cmd.args());
    }

    #[test]
    fn parse_rejects_reply_and_garbage() {
        assert!(Command::parse(b"sAN mNPOSGetData 1").is_err());
        assert!(Command::parse(b"sRN").is_err());
        assert!(Command::parse(b"").is_err());
        assert!(Command::parse(&[0xFF, 0xFE]).is_err());
    }
}
