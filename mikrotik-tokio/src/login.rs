//! Login handshake (§6): plain `name`/`password` first, falling back to the
//! MD5 challenge-response form for routers that still require it.

use md5::{Digest, Md5};
use mikrotik_proto::{Command, CommandBuilder, CommandResponse};
use tokio::sync::mpsc;

use crate::connector::Connector;
use crate::error::{DeviceError, DeviceResult};

/// Performs the `/login` handshake over an already-connected [`Connector`].
pub(crate) async fn login(connector: &Connector, username: &str, password: Option<&str>) -> DeviceResult<()> {
    let response = send_login(connector, CommandBuilder::login(username, password)?).await?;

    match response {
        CommandResponse::Done(done) if done.ret().is_none() => Ok(()),
        CommandResponse::Done(done) => {
            let challenge = done.ret().expect("checked above").to_string();
            let response = md5_challenge_response(password.unwrap_or(""), &challenge)?;
            let retry = CommandBuilder::new()
                .command("/login")?
                .attribute("name", Some(username))?
                .attribute("response", Some(&response))?
                .build();
            match send_login(connector, retry).await? {
                CommandResponse::Done(_) => Ok(()),
                CommandResponse::Trap(trap) => Err(DeviceError::LoginRejected { response: trap }),
                other => Err(DeviceError::ResponseSequence {
                    received: Box::new(other),
                    expected: vec!["!done", "!trap"],
                }),
            }
        }
        CommandResponse::Trap(trap) => Err(DeviceError::LoginRejected { response: trap }),
        other => Err(DeviceError::ResponseSequence {
            received: Box::new(other),
            expected: vec!["!done", "!trap"],
        }),
    }
}

async fn send_login(connector: &Connector, command: Command) -> DeviceResult<CommandResponse> {
    let (respond_to, mut rx) = mpsc::channel(1);
    connector.submit(command, respond_to).await?;
    rx.recv()
        .await
        .ok_or_else(|| DeviceError::Channel("no login response received".to_string()))?
}

fn md5_challenge_response(password: &str, challenge_hex: &str) -> DeviceResult<String> {
    let challenge = decode_hex(challenge_hex)
        .ok_or_else(|| DeviceError::Channel("challenge was not valid hex".to_string()))?;

    let mut hasher = Md5::new();
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hasher.update(&challenge);
    let digest = hasher.finalize();

    let mut response = String::with_capacity(2 + digest.len() * 2);
    response.push_str("00");
    for byte in digest {
        response.push_str(&format!("{byte:02x}"));
    }
    Ok(response)
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_hex_roundtrips() {
        assert_eq!(decode_hex("00ff"), Some(vec![0x00, 0xff]));
        assert_eq!(decode_hex("a"), None);
        assert_eq!(decode_hex("zz"), None);
    }

    #[test]
    fn md5_challenge_response_has_00_prefix_and_32_hex_chars() {
        let response = md5_challenge_response("hunter2", "0011223344556677").unwrap();
        assert!(response.starts_with("00"));
        assert_eq!(response.len(), 2 + 32);
    }
}
