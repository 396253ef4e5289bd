use ir_relay::config::{EncoderConfig, EncoderKind};
use ir_relay::core::message::{Command, Status};
use ir_relay::protocol::encoder::{AesEncoder, ConfiguredEncoder, Encoder, PlainEncoder};
use ir_relay::utils::crypto::{BlockCrypto, BLOCK_SIZE};
use ir_relay::ProtocolError;

fn command() -> Command {
    Command {
        data: vec![9000, 4500, 562, 1687],
        sequence: 17,
    }
}

#[test]
fn aes_payload_layout() {
    let encoder = AesEncoder::new("hunter2");
    let payload = encoder.encrypt(&command()).unwrap();

    assert_eq!(payload.len() % BLOCK_SIZE, 0);
    assert!(payload.len() >= 2 * BLOCK_SIZE);

    // the body under the framing is plain JSON
    let body = BlockCrypto::new("hunter2").open(&payload).unwrap();
    assert_eq!(body, br#"{"data":[9000,4500,562,1687],"sequence":17}"#);
}

#[test]
fn aes_roundtrip() {
    let encoder = AesEncoder::new("hunter2");
    let payload = encoder.encrypt(&Status::new(u64::MAX)).unwrap();
    let status: Status = encoder.decrypt(&payload).unwrap();
    assert_eq!(status.watermark, u64::MAX);
}

#[test]
fn wrong_secret_never_decodes() {
    let sender = AesEncoder::new("correct horse");
    let payload = sender.encrypt(&command()).unwrap();

    for secret in ["", "correct horse ", "Correct horse", "battery staple"] {
        let receiver = AesEncoder::new(secret);
        match receiver.decrypt::<Command>(&payload) {
            Err(ProtocolError::InvalidMagic) | Err(ProtocolError::InvalidPadding(_)) => {}
            other => panic!("secret {secret:?} produced {other:?}"),
        }
    }
}

#[test]
fn truncated_payload_is_invalid_length() {
    let encoder = AesEncoder::new("hunter2");
    let payload = encoder.encrypt(&command()).unwrap();

    assert!(matches!(
        encoder.decrypt::<Command>(&payload[..payload.len() - 1]),
        Err(ProtocolError::InvalidLength(_))
    ));
    assert!(matches!(
        encoder.decrypt::<Command>(&payload[..BLOCK_SIZE]),
        Err(ProtocolError::InvalidLength(16))
    ));
}

#[test]
fn shape_mismatch_surfaces_json_error() {
    let encoder = AesEncoder::new("hunter2");
    let payload = encoder.encrypt(&Status::new(3)).unwrap();

    let err = encoder.decrypt::<Command>(&payload).unwrap_err();
    assert!(matches!(err, ProtocolError::Json(_)));
    assert!(err.is_malformed());
}

#[test]
fn plain_encoder_is_bare_json() {
    let payload = PlainEncoder.encrypt(&command()).unwrap();
    assert_eq!(payload, br#"{"data":[9000,4500,562,1687],"sequence":17}"#);

    let status: Status = PlainEncoder
        .decrypt(br#"{"last_command_sequence_number":42}"#)
        .unwrap();
    assert_eq!(status, Status::new(42));
}

#[test]
fn configured_encoder_interoperates() {
    let aes = ConfiguredEncoder::from_config(&EncoderConfig {
        kind: EncoderKind::Aes,
        shared_secret: "shared".to_string(),
    });
    let payload = aes.encrypt(&command()).unwrap();
    let decoded: Command = AesEncoder::new("shared").decrypt(&payload).unwrap();
    assert_eq!(decoded, command());

    let plain = ConfiguredEncoder::from_config(&EncoderConfig {
        kind: EncoderKind::Plain,
        shared_secret: String::new(),
    });
    assert_eq!(
        plain.encrypt(&command()).unwrap(),
        PlainEncoder.encrypt(&command()).unwrap()
    );
}

/// Frame a body the way the device firmware does: every block, IV included,
/// encrypted on its own under SHA-256(secret)
fn device_frame(secret: &str, body: &[u8]) -> Vec<u8> {
    use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
    use sha2::{Digest, Sha256};

    let key = Sha256::digest(secret.as_bytes());
    let cipher = aes::Aes256::new(&key);

    let mut buf = vec![0xA7; BLOCK_SIZE];
    buf.extend_from_slice(b"IRREMOTE");
    buf.extend_from_slice(body);
    let padding = BLOCK_SIZE - buf.len() % BLOCK_SIZE;
    buf.resize(buf.len() + padding, padding as u8);
    for block in buf.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    buf
}

#[test]
fn reads_device_framed_status() {
    let payload = device_frame("s3cret", br#"{"last_command_sequence_number":7}"#);
    let status: Status = AesEncoder::new("s3cret").decrypt(&payload).unwrap();
    assert_eq!(status, Status::new(7));
}

#[test]
fn device_reads_relay_payload() {
    use aes::cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
    use sha2::{Digest, Sha256};

    let payload = AesEncoder::new("s3cret").encrypt(&command()).unwrap();

    let key = Sha256::digest(b"s3cret");
    let cipher = aes::Aes256::new(&key);
    let mut plain = payload.clone();
    for block in plain.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let padding = *plain.last().unwrap() as usize;
    let framed = &plain[BLOCK_SIZE..plain.len() - padding];
    assert_eq!(&framed[..8], b"IRREMOTE");
    let decoded: Command = serde_json::from_slice(&framed[8..]).unwrap();
    assert_eq!(decoded, command());
}

#[test]
fn relay_messages_always_encrypt() {
    let extreme = Command {
        data: vec![u32::MAX; 512],
        sequence: u64::MAX,
    };
    let empty = Command {
        data: Vec::new(),
        sequence: 0,
    };

    for encoder in [
        ConfiguredEncoder::Aes(AesEncoder::new("")),
        ConfiguredEncoder::Plain(PlainEncoder),
    ] {
        assert!(encoder.encrypt(&extreme).is_ok());
        assert!(encoder.encrypt(&empty).is_ok());
        assert!(encoder.encrypt(&Status::new(u64::MAX)).is_ok());
    }
}
