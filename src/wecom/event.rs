// src/wecom/event.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::WeComError;

pub const ADD_EXTERNAL_CONTACT: &str = "add_external_contact";

// Tokens de estado que começam com "BD" identificam leads vindos do Baidu.
pub const BAIDU_STATE_PREFIX: &str = "BD";

/// Evento de "mudança de contato externo" já decifrado.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalContactEvent {
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: Option<String>,
    #[serde(rename = "FromUserName", default)]
    pub from_user_name: Option<String>,
    #[serde(rename = "CreateTime", default)]
    pub create_time: Option<String>,
    #[serde(rename = "MsgType", default)]
    pub msg_type: Option<String>,
    #[serde(rename = "Event", default)]
    pub event: Option<String>,
    #[serde(rename = "ChangeType", default)]
    pub change_type: Option<String>,
    #[serde(rename = "UserID", default)]
    pub user_id: Option<String>,
    #[serde(rename = "ExternalUserID", default)]
    pub external_user_id: Option<String>,
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "WelcomeCode", default)]
    pub welcome_code: Option<String>,
}

impl ExternalContactEvent {
    pub fn parse(xml: &str) -> Result<Self, WeComError> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Token de estado do Baidu, se este evento for um "adicionar contato externo".
    /// Qualquer outro evento é descartado em silêncio por quem chama.
    pub fn baidu_state(&self) -> Option<&str> {
        if self.change_type.as_deref() != Some(ADD_EXTERNAL_CONTACT) {
            return None;
        }
        self.state
            .as_deref()
            .filter(|s| s.starts_with(BAIDU_STATE_PREFIX))
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.create_time.as_deref()?.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

/// "BD12345" -> "12345"
pub fn bd_vid_from_state(state: &str) -> Option<&str> {
    state
        .strip_prefix(BAIDU_STATE_PREFIX)
        .filter(|vid| !vid.is_empty())
}

pub fn state_for_bd_vid(bd_vid: &str) -> String {
    format!("{BAIDU_STATE_PREFIX}{bd_vid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD_CONTACT_XML: &str = r#"<xml>
        <ToUserName><![CDATA[ww4d8b2c0e]]></ToUserName>
        <FromUserName><![CDATA[sys]]></FromUserName>
        <CreateTime>1403610513</CreateTime>
        <MsgType><![CDATA[event]]></MsgType>
        <Event><![CDATA[change_external_contact]]></Event>
        <ChangeType><![CDATA[add_external_contact]]></ChangeType>
        <UserID><![CDATA[zhangsan]]></UserID>
        <ExternalUserID><![CDATA[woAJ2GCAAAXtWyujaWJHDDGi0mACAAAA]]></ExternalUserID>
        <State><![CDATA[BD12345]]></State>
        <WelcomeCode><![CDATA[WELCOMECODE]]></WelcomeCode>
    </xml>"#;

    #[test]
    fn parses_add_external_contact_event() {
        let event = ExternalContactEvent::parse(ADD_CONTACT_XML).unwrap();

        assert_eq!(event.change_type.as_deref(), Some("add_external_contact"));
        assert_eq!(event.user_id.as_deref(), Some("zhangsan"));
        assert_eq!(
            event.external_user_id.as_deref(),
            Some("woAJ2GCAAAXtWyujaWJHDDGi0mACAAAA")
        );
        assert_eq!(event.baidu_state(), Some("BD12345"));
        assert_eq!(event.created_at().unwrap().timestamp(), 1403610513);
    }

    #[test]
    fn ignores_other_change_types_and_states() {
        let mut event = ExternalContactEvent::parse(ADD_CONTACT_XML).unwrap();
        event.change_type = Some("del_external_contact".into());
        assert_eq!(event.baidu_state(), None);

        event.change_type = Some(ADD_EXTERNAL_CONTACT.into());
        event.state = Some("XX12345".into());
        assert_eq!(event.baidu_state(), None);

        event.state = None;
        assert_eq!(event.baidu_state(), None);
    }

    #[test]
    fn missing_elements_are_none() {
        let event =
            ExternalContactEvent::parse("<xml><ChangeType>edit_external_contact</ChangeType></xml>")
                .unwrap();
        assert_eq!(event.state, None);
        assert_eq!(event.created_at(), None);
    }

    #[test]
    fn bd_vid_round_trip_through_state() {
        assert_eq!(bd_vid_from_state("BD12345"), Some("12345"));
        assert_eq!(bd_vid_from_state("BD"), None);
        assert_eq!(state_for_bd_vid("12345"), "BD12345");
    }
}
