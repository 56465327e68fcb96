//! 门票编号：128 位随机值，以 36 字符的标准 UUID 形式对外展示

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 门票编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketCode(Uuid);

impl TicketCode {
    /// 生成新的随机编号
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

/// 编号格式错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ticket code must be a 36-character lowercase canonical UUID, got '{0}'")]
pub struct InvalidTicketCode(pub String);

impl FromStr for TicketCode {
    type Err = InvalidTicketCode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // 只接受带连字符的小写标准形式，保证编号原样往返
        if raw.len() != 36 || raw.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(InvalidTicketCode(raw.to_string()));
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| InvalidTicketCode(raw.to_string()))
    }
}

impl TryFrom<String> for TicketCode {
    type Error = InvalidTicketCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TicketCode> for String {
    fn from(code: TicketCode) -> Self {
        code.to_string()
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_canonical() {
        let code = TicketCode::generate();
        let rendered = code.to_string();
        assert_eq!(rendered.len(), 36);
        assert_eq!(rendered.parse::<TicketCode>().unwrap(), code);
    }

    #[test]
    fn rejects_non_canonical_forms() {
        assert!("6f9619ff8b864d11b42d00c04fc964ff".parse::<TicketCode>().is_err());
        assert!("{6f9619ff-8b86-4d11-b42d-00c04fc964ff}".parse::<TicketCode>().is_err());
        assert!("not-a-code".parse::<TicketCode>().is_err());
        assert!("".parse::<TicketCode>().is_err());
    }

    #[test]
    fn uppercase_input_is_rejected() {
        assert!("6F9619FF-8B86-4D11-B42D-00C04FC964FF".parse::<TicketCode>().is_err());
        assert!("6f9619ff-8b86-4d11-b42d-00C04fc964ff".parse::<TicketCode>().is_err());
        let raw = "6f9619ff-8b86-4d11-b42d-00c04fc964ff";
        assert_eq!(raw.parse::<TicketCode>().unwrap().to_string(), raw);
    }
}
