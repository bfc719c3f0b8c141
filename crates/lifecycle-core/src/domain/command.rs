//! # Protocol Vocabulary
//!
//! Closed set of tokens exchanged between the Service VM and its User VMs, plus
//! the requests and replies carried over the local admin socket.
//!
//! Tokens are case-sensitive ASCII literals. They are parsed once at the
//! transport boundary; everything past that point matches on the enums below.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Peer-channel protocol command.
///
/// ```text
/// User VM                              Service VM
///    │ ──────────── SYNC ──────────────→ │
///    │ ←────────── ACK_SYNC ──────────── │
///    │ ──────── REQ_SYS_SHUTDOWN ──────→ │
///    │ ←────── ACK_REQ_SYS_SHUTDOWN ──── │
///    │ ←───────── POWEROFF_CMD ───────── │   (broadcast)
///    │ ────────── ACK_POWEROFF ────────→ │
///    │ ←──────── USER_VM_SHUTDOWN ────── │   (single guest)
///    │ ────── ACK_USER_VM_SHUTDOWN ────→ │
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Sync,
    AckSync,
    ReqSysShutdown,
    AckReqSysShutdown,
    PoweroffCmd,
    AckPoweroff,
    UserVmShutdown,
    AckUserVmShutdown,
}

impl Command {
    /// All commands, in protocol order.
    pub const ALL: [Command; 8] = [
        Command::Sync,
        Command::AckSync,
        Command::ReqSysShutdown,
        Command::AckReqSysShutdown,
        Command::PoweroffCmd,
        Command::AckPoweroff,
        Command::UserVmShutdown,
        Command::AckUserVmShutdown,
    ];

    /// Wire token for this command.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Command::Sync => "SYNC",
            Command::AckSync => "ACK_SYNC",
            Command::ReqSysShutdown => "REQ_SYS_SHUTDOWN",
            Command::AckReqSysShutdown => "ACK_REQ_SYS_SHUTDOWN",
            Command::PoweroffCmd => "POWEROFF_CMD",
            Command::AckPoweroff => "ACK_POWEROFF",
            Command::UserVmShutdown => "USER_VM_SHUTDOWN",
            Command::AckUserVmShutdown => "ACK_USER_VM_SHUTDOWN",
        }
    }

    /// Raw bytes handed to the transport.
    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim_end_matches(['\r', '\n', '\0']);
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == token)
            .ok_or_else(|| ParseError::UnknownCommand(token.to_string()))
    }
}

/// Request received from a local admin client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminRequest {
    /// `REQ_SYS_SHUTDOWN`: host shutdown on the Service VM, forwarded to
    /// the Service VM when received by a User VM.
    SystemShutdown,
    /// `REQ_USER_VM_SHUTDOWN:<name>`: shut down one named guest.
    UserVmShutdown { vm_name: String },
}

impl AdminRequest {
    const SYS_SHUTDOWN: &'static str = "REQ_SYS_SHUTDOWN";
    const USER_VM_SHUTDOWN: &'static str = "REQ_USER_VM_SHUTDOWN";

    /// Encode for the admin socket (no line terminator).
    pub fn encode(&self) -> String {
        match self {
            AdminRequest::SystemShutdown => Self::SYS_SHUTDOWN.to_string(),
            AdminRequest::UserVmShutdown { vm_name } => {
                format!("{}:{}", Self::USER_VM_SHUTDOWN, vm_name)
            }
        }
    }
}

impl FromStr for AdminRequest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n', '\0']);
        if line == Self::SYS_SHUTDOWN {
            return Ok(AdminRequest::SystemShutdown);
        }
        match line.split_once(':') {
            Some((Self::USER_VM_SHUTDOWN, name)) if !name.is_empty() => {
                Ok(AdminRequest::UserVmShutdown {
                    vm_name: name.to_string(),
                })
            }
            Some((Self::USER_VM_SHUTDOWN, _)) => Err(ParseError::MissingVmName),
            _ => Err(ParseError::UnknownAdminRequest(line.to_string())),
        }
    }
}

/// Reply written back to an admin client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminReply {
    AckReqSysShutdown,
    AckReqUserVmShutdown,
    UserVmDisconnect,
}

impl AdminReply {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AdminReply::AckReqSysShutdown => "ACK_REQ_SYS_SHUTDOWN",
            AdminReply::AckReqUserVmShutdown => "ACK_REQ_USER_VM_SHUTDOWN",
            AdminReply::UserVmDisconnect => "USER_VM_DISCONNECT",
        }
    }
}

impl fmt::Display for AdminReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminReply {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim_end_matches(['\r', '\n', '\0']);
        [
            AdminReply::AckReqSysShutdown,
            AdminReply::AckReqUserVmShutdown,
            AdminReply::UserVmDisconnect,
        ]
        .into_iter()
        .find(|r| r.as_str() == token)
        .ok_or_else(|| ParseError::UnknownAdminReply(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_parses_from_its_token() {
        for command in Command::ALL {
            assert_eq!(command.as_str().parse::<Command>().unwrap(), command);
        }
    }

    #[test]
    fn test_command_parse_is_case_sensitive() {
        assert!(matches!(
            "sync".parse::<Command>(),
            Err(ParseError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_command_parse_strips_line_terminators() {
        assert_eq!("ACK_POWEROFF\r\n".parse::<Command>().unwrap(), Command::AckPoweroff);
        assert_eq!("POWEROFF_CMD\0".parse::<Command>().unwrap(), Command::PoweroffCmd);
    }

    #[test]
    fn test_command_parse_rejects_prefix_match() {
        assert!("ACK_SYNC_EXTRA".parse::<Command>().is_err());
    }

    #[test]
    fn test_admin_request_user_vm_carries_name() {
        let request: AdminRequest = "REQ_USER_VM_SHUTDOWN:vm1\n".parse().unwrap();
        assert_eq!(
            request,
            AdminRequest::UserVmShutdown {
                vm_name: "vm1".to_string()
            }
        );
        assert_eq!(request.encode(), "REQ_USER_VM_SHUTDOWN:vm1");
    }

    #[test]
    fn test_admin_request_without_name_is_rejected() {
        assert_eq!(
            "REQ_USER_VM_SHUTDOWN:".parse::<AdminRequest>(),
            Err(ParseError::MissingVmName)
        );
    }

    #[test]
    fn test_admin_request_system_shutdown() {
        assert_eq!(
            "REQ_SYS_SHUTDOWN".parse::<AdminRequest>().unwrap(),
            AdminRequest::SystemShutdown
        );
        assert!("REQ_SYS_SHUTDOWN:vm1".parse::<AdminRequest>().is_err());
    }

    #[test]
    fn test_admin_reply_tokens() {
        assert_eq!(AdminReply::UserVmDisconnect.to_string(), "USER_VM_DISCONNECT");
        assert_eq!(
            "ACK_REQ_USER_VM_SHUTDOWN".parse::<AdminReply>().unwrap(),
            AdminReply::AckReqUserVmShutdown
        );
    }
}
