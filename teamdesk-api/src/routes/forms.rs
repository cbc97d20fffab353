/// Form extraction helpers shared by the HTML-form endpoints
///
/// Browsers post `application/x-www-form-urlencoded` bodies. [`ValidForm`]
/// deserializes and validates such a body in one step; [`FormFields`] keeps
/// every pair so multi-select inputs (`members=1&members=2`) survive.

use axum::{
    extract::{FromRequest, Request},
    Form,
};
use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use validator::Validate;

use crate::error::ApiError;

/// Accepted `datetime-local` layouts, most specific browser output first
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Form body that has passed `validator` checks
#[derive(Debug, Clone)]
pub struct ValidForm<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidForm<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidForm(value))
    }
}

/// Raw form pairs with repeated keys preserved
#[derive(Debug, Clone, Default)]
pub struct FormFields(pub Vec<(String, String)>);

impl FormFields {
    /// First value for `key`, trimmed; empty values count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str, ApiError> {
        self.get(key)
            .ok_or_else(|| ApiError::BadRequest(format!("{} is required", key)))
    }

    /// Every value for `key` parsed as an id
    pub fn ids(&self, key: &str) -> Result<Vec<i64>, ApiError> {
        self.0
            .iter()
            .filter(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| parse_id(key, v))
            .collect()
    }
}

#[axum::async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(FormFields(pairs))
    }
}

pub fn parse_id(field: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{} must be a numeric id", field)))
}

/// Parses the value of an `<input type="datetime-local">`
pub fn parse_datetime_local(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Serde adapter for `datetime-local` fields
pub fn datetime_local<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_datetime_local(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date and time: {}", raw)))
}

/// Serde adapter for optional `datetime-local` fields; blank means absent
pub fn optional_datetime_local<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => parse_datetime_local(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date and time: {}", raw))),
        _ => Ok(None),
    }
}

/// Serde adapter trimming surrounding whitespace before validation runs
pub fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

/// Serde adapter turning blank optional strings into `None`
pub fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header};

    fn form_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(length(min = 1, max = 5, message = "Name must be 1-5 characters"))]
        name: String,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct TrimmedSample {
        #[serde(deserialize_with = "trimmed")]
        #[validate(length(min = 1, max = 5, message = "Name must be 1-5 characters"))]
        name: String,
    }

    #[test]
    fn test_parse_datetime_local() {
        let expected = NaiveDateTime::parse_from_str("2025-03-01 18:00:00", "%Y-%m-%d %H:%M:%S").unwrap();

        assert_eq!(parse_datetime_local("2025-03-01T18:00"), Some(expected));
        assert_eq!(parse_datetime_local("2025-03-01T18:00:00"), Some(expected));
        assert_eq!(parse_datetime_local(" 2025-03-01 18:00:00 "), Some(expected));
        assert_eq!(parse_datetime_local("01.03.2025 18:00"), None);
        assert_eq!(parse_datetime_local(""), None);
    }

    #[tokio::test]
    async fn test_form_fields_keeps_repeated_keys() {
        let fields = FormFields::from_request(form_request("name=Core&members=1&members=3&members="), &())
            .await
            .unwrap();

        assert_eq!(fields.get("name"), Some("Core"));
        assert_eq!(fields.ids("members").unwrap(), vec![1, 3]);
        assert!(fields.ids("absent").unwrap().is_empty());
        assert!(fields.require("description").is_err());
    }

    #[tokio::test]
    async fn test_form_fields_rejects_bad_id() {
        let fields = FormFields::from_request(form_request("members=one"), &())
            .await
            .unwrap();

        assert!(matches!(fields.ids("members"), Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_valid_form_runs_validation() {
        let ok = ValidForm::<Sample>::from_request(form_request("name=Ann"), &()).await;
        assert_eq!(ok.unwrap().0.name, "Ann");

        let too_long = ValidForm::<Sample>::from_request(form_request("name=Annabelle"), &()).await;
        assert!(matches!(too_long, Err(ApiError::ValidationError(_))));

        let missing = ValidForm::<Sample>::from_request(form_request("other=1"), &()).await;
        assert!(matches!(missing, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_trimmed_fields_validate_without_whitespace() {
        let padded = ValidForm::<TrimmedSample>::from_request(form_request("name=%20%20Ann%20%20"), &()).await;
        assert_eq!(padded.unwrap().0.name, "Ann");

        let blank = ValidForm::<TrimmedSample>::from_request(form_request("name=%20%20%20"), &()).await;
        assert!(matches!(blank, Err(ApiError::ValidationError(_))));

        // Padding does not count against the maximum length.
        let long_padded = ValidForm::<TrimmedSample>::from_request(form_request("name=+Annie+"), &()).await;
        assert_eq!(long_padded.unwrap().0.name, "Annie");
    }
}
