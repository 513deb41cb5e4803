// src/wecom/crypto.rs
//
// Esquema de "criptografia de mensagens" do WeCom:
//   assinatura = hex(SHA1(concat(sort([token, timestamp, nonce, encrypt]))))
//   conteúdo   = base64(AES-256-CBC(random16 | len_be32(msg) | msg | receive_id))
// A chave vem da EncodingAESKey (43 chars + "="), o IV são os 16 primeiros bytes dela
// e o padding é PKCS#7 com blocos de 32 bytes.

use base64::{
    Engine,
    alphabet,
    engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD},
};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use rand::{Rng, distributions::Alphanumeric};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use super::error::WeComError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const PAD_BLOCK_SIZE: usize = 32;
const RANDOM_PREFIX_LEN: usize = 16;

// A EncodingAESKey não é base64 canônico: o último caractere pode ter bits sobrando.
const AES_KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Deserialize)]
struct EncryptedEnvelope {
    #[serde(rename = "Encrypt")]
    encrypt: String,
}

#[derive(Clone)]
pub struct WeComCrypt {
    token: String,
    key: [u8; 32],
    receive_id: String,
}

impl WeComCrypt {
    pub fn new(token: &str, encoding_aes_key: &str, receive_id: &str) -> Result<Self, WeComError> {
        let decoded = AES_KEY_ENGINE
            .decode(format!("{}=", encoding_aes_key.trim()))
            .map_err(|_| WeComError::InvalidAesKey)?;
        let key: [u8; 32] = decoded.try_into().map_err(|_| WeComError::InvalidAesKey)?;

        Ok(Self {
            token: token.to_string(),
            key,
            receive_id: receive_id.to_string(),
        })
    }

    pub fn signature(&self, timestamp: &str, nonce: &str, encrypt: &str) -> String {
        let mut parts = [self.token.as_str(), timestamp, nonce, encrypt];
        parts.sort_unstable();
        hex::encode(Sha1::digest(parts.concat().as_bytes()))
    }

    fn verify_signature(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        encrypt: &str,
    ) -> Result<(), WeComError> {
        if self.signature(timestamp, nonce, encrypt) == msg_signature {
            Ok(())
        } else {
            Err(WeComError::InvalidSignature)
        }
    }

    /// Desafio de posse da URL: valida e devolve o `echostr` decifrado.
    pub fn verify_url(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        echostr: &str,
    ) -> Result<String, WeComError> {
        self.verify_signature(msg_signature, timestamp, nonce, echostr)?;
        self.decrypt(echostr)
    }

    /// Decifra o corpo de um callback (`<xml><Encrypt>..</Encrypt>..</xml>`).
    pub fn decrypt_msg(
        &self,
        post_data: &[u8],
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<String, WeComError> {
        let body = std::str::from_utf8(post_data)
            .map_err(|e| WeComError::MalformedXml(e.to_string()))?;
        let envelope: EncryptedEnvelope = quick_xml::de::from_str(body)?;

        self.verify_signature(msg_signature, timestamp, nonce, &envelope.encrypt)?;
        self.decrypt(&envelope.encrypt)
    }

    /// Monta a resposta cifrada e assinada no formato que o WeCom espera.
    pub fn encrypt_msg(&self, reply: &str, timestamp: &str, nonce: &str) -> Result<String, WeComError> {
        let encrypt = self.encrypt(reply)?;
        let signature = self.signature(timestamp, nonce, &encrypt);

        Ok(format!(
            "<xml><Encrypt><![CDATA[{encrypt}]]></Encrypt>\
             <MsgSignature><![CDATA[{signature}]]></MsgSignature>\
             <TimeStamp>{timestamp}</TimeStamp>\
             <Nonce><![CDATA[{nonce}]]></Nonce></xml>"
        ))
    }

    fn encrypt(&self, text: &str) -> Result<String, WeComError> {
        let prefix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_PREFIX_LEN)
            .map(char::from)
            .collect();
        let msg_len = u32::try_from(text.len()).map_err(|_| WeComError::Encrypt)?;

        let mut buf = Vec::with_capacity(
            RANDOM_PREFIX_LEN + 4 + text.len() + self.receive_id.len() + PAD_BLOCK_SIZE,
        );
        buf.extend_from_slice(prefix.as_bytes());
        buf.extend_from_slice(&msg_len.to_be_bytes());
        buf.extend_from_slice(text.as_bytes());
        buf.extend_from_slice(self.receive_id.as_bytes());
        pkcs7_pad(&mut buf);

        let len = buf.len();
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.key[..16])
            .map_err(|_| WeComError::Encrypt)?;
        let encrypted = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| WeComError::Encrypt)?;

        Ok(STANDARD.encode(encrypted))
    }

    fn decrypt(&self, encrypted: &str) -> Result<String, WeComError> {
        let mut buf = STANDARD.decode(encrypted.trim())?;

        let cipher = Aes256CbcDec::new_from_slices(&self.key, &self.key[..16])
            .map_err(|_| WeComError::Decrypt)?;
        let plain = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| WeComError::Decrypt)?;
        let content = pkcs7_unpad(plain).ok_or(WeComError::Decrypt)?;

        if content.len() < RANDOM_PREFIX_LEN + 4 {
            return Err(WeComError::Decrypt);
        }
        let content = &content[RANDOM_PREFIX_LEN..];

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&content[..4]);
        let msg_len = u32::from_be_bytes(len_bytes) as usize;

        let rest = &content[4..];
        if rest.len() < msg_len {
            return Err(WeComError::Decrypt);
        }
        let (msg, receive_id) = rest.split_at(msg_len);

        if receive_id != self.receive_id.as_bytes() {
            return Err(WeComError::ReceiveIdMismatch);
        }

        String::from_utf8(msg.to_vec()).map_err(|_| WeComError::Decrypt)
    }
}

fn pkcs7_pad(buf: &mut Vec<u8>) {
    let pad = PAD_BLOCK_SIZE - (buf.len() % PAD_BLOCK_SIZE);
    buf.extend(std::iter::repeat(pad as u8).take(pad));
}

fn pkcs7_unpad(buf: &[u8]) -> Option<&[u8]> {
    let pad = *buf.last()? as usize;
    if pad == 0 || pad > PAD_BLOCK_SIZE || pad > buf.len() {
        return None;
    }
    Some(&buf[..buf.len() - pad])
}
