//! `application/x-www-form-urlencoded` decoding for message submissions.

/// Decoded form fields in first-seen key order.
///
/// A repeated key keeps its original position but takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    fields: Vec<(String, String)>,
}

impl FormFields {
    /// Look up a field value by name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, key: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }
}

/// Form decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// A pair had no `=` separator.
    MissingSeparator(String),
    /// A key or value was not valid UTF-8 after percent-decoding.
    InvalidEncoding(String),
    /// The `username,message` pair did not split into exactly two parts.
    FieldCount(usize),
}

impl std::fmt::Display for FormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::MissingSeparator(pair) => {
                write!(f, "malformed form: pair '{}' has no '='", pair)
            }
            FormError::InvalidEncoding(part) => {
                write!(f, "malformed form: '{}' is not valid UTF-8", part)
            }
            FormError::FieldCount(n) => {
                write!(f, "malformed form: expected username,message but got {} parts", n)
            }
        }
    }
}

impl std::error::Error for FormError {}

/// Decode a URL-encoded body into fields.
///
/// Pairs are split on `&`, then on the first `=`. Keys and values are
/// `+`/percent decoded and values are trimmed.
///
/// Splitting happens before decoding, so an encoded `%26` or `%3D` stays
/// inside its key or value instead of starting a new pair. Decoding the
/// whole body first would make `username=a%26b` split into two pairs.
///
/// The raw body must be valid UTF-8, the same as a percent-decoded part.
pub fn decode(body: &[u8]) -> Result<FormFields, FormError> {
    let body = std::str::from_utf8(body)
        .map_err(|_| FormError::InvalidEncoding(String::from_utf8_lossy(body).into_owned()))?;
    let mut fields = FormFields::default();

    for pair in body.split('&') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| FormError::MissingSeparator(pair.to_string()))?;
        let key = decode_component(key)?;
        let value = decode_component(value)?;
        fields.insert(key, value.trim().to_string());
    }

    Ok(fields)
}

fn decode_component(raw: &str) -> Result<String, FormError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| FormError::InvalidEncoding(raw.to_string()))
}

/// Extract `(username, message)` from decoded fields.
///
/// The two values travel as one comma-joined payload: they are joined with
/// `,` and split again, so a comma inside either value (or a missing field)
/// leaves the wrong number of parts and the submission is rejected.
pub fn username_message(fields: &FormFields) -> Result<(String, String), FormError> {
    let joined = [fields.get("username"), fields.get("message")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(",");

    let parts: Vec<&str> = joined.split(',').collect();
    match parts.as_slice() {
        [username, message] => Ok((username.trim().to_string(), message.trim().to_string())),
        _ => Err(FormError::FieldCount(parts.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        let fields = decode(b"username=Alice&message=Hello").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("username"), Some("Alice"));
        assert_eq!(fields.get("message"), Some("Hello"));
    }

    #[test]
    fn test_decode_plus_and_percent() {
        let fields = decode(b"username=Bob+Smith&message=caf%C3%A9+%26+tea%3D").unwrap();
        assert_eq!(fields.get("username"), Some("Bob Smith"));
        assert_eq!(fields.get("message"), Some("café & tea="));
    }

    #[test]
    fn test_values_trimmed() {
        let fields = decode(b"username=++Alice++&message=%20Hi%0A").unwrap();
        assert_eq!(fields.get("username"), Some("Alice"));
        assert_eq!(fields.get("message"), Some("Hi"));
    }

    #[test]
    fn test_split_on_first_equals() {
        let fields = decode(b"message=a=b").unwrap();
        assert_eq!(fields.get("message"), Some("a=b"));
    }

    #[test]
    fn test_duplicate_key_keeps_last() {
        let fields = decode(b"username=first&message=m&username=last").unwrap();
        let order: Vec<_> = fields.iter().collect();
        assert_eq!(order, vec![("username", "last"), ("message", "m")]);
    }

    #[test]
    fn test_missing_separator() {
        assert_eq!(
            decode(b"username=Alice&message"),
            Err(FormError::MissingSeparator("message".to_string()))
        );
        assert!(decode(b"").is_err());
        assert!(decode(b"username=a&").is_err());
    }

    #[test]
    fn test_invalid_utf8_after_decode() {
        assert!(matches!(
            decode(b"username=%FF"),
            Err(FormError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_invalid_raw_utf8() {
        assert!(matches!(
            decode(b"username=\xff&message=hi"),
            Err(FormError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_encoded_separators_stay_in_value() {
        let fields = decode(b"username=a%26message%3Db&message=hi").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("username"), Some("a&message=b"));
        assert_eq!(fields.get("message"), Some("hi"));
    }

    #[test]
    fn test_username_message() {
        let fields = decode(b"username=Alice&message=Hello").unwrap();
        assert_eq!(
            username_message(&fields).unwrap(),
            ("Alice".to_string(), "Hello".to_string())
        );
    }

    #[test]
    fn test_username_message_rejects_comma() {
        let fields = decode(b"username=Alice&message=Hello%2C+world").unwrap();
        assert_eq!(username_message(&fields), Err(FormError::FieldCount(3)));
    }

    #[test]
    fn test_username_message_missing_field() {
        let fields = decode(b"username=Alice").unwrap();
        assert_eq!(username_message(&fields), Err(FormError::FieldCount(1)));
    }
}
