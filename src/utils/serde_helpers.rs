// 前端传来的ID可能是数字也可能是字符串（路由参数），时间可能是 datetime-local 格式

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

fn parse_raw_id<E: serde::de::Error>(raw: RawId) -> Result<i64, E> {
    match raw {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid id: {text:?}"))),
    }
}

pub mod flexible_id {
    use super::*;

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        parse_raw_id(RawId::deserialize(deserializer)?)
    }
}

pub mod optional_flexible_id {
    use super::*;

    pub fn serialize<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.serialize_some(id),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        match Option::<RawId>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawId::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(raw) => parse_raw_id(raw).map(Some),
        }
    }
}

pub mod optional_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};

    use super::*;

    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

    /// 空字符串视为未填写；不带时区的时间按 UTC 处理
    pub fn parse(text: &str) -> Option<Result<DateTime<Utc>, String>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Some(Ok(parsed.with_timezone(&Utc)));
        }
        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok());
        Some(naive.map(|n| n.and_utc()).ok_or_else(|| format!("invalid datetime: {text:?}")))
    }

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&value.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(text) => parse(&text).transpose().map_err(serde::de::Error::custom),
        }
    }
}
