use std::str::FromStr;

use uuid::Uuid;

/// Returned when a wire-level identifier isn't a valid UUID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ID `{0}`")]
pub struct InvalidId(pub String);

/// Converts an opaque wire-level identifier into the UUID that the database
/// uses as primary key.
pub fn parse_id(id: &str) -> Result<Uuid, InvalidId> {
    Uuid::from_str(id.trim()).map_err(|_| InvalidId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hyphenated_uuid() {
        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        assert_eq!(parse_id(id).unwrap().to_string(), id);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_id("doggo"), Err(InvalidId("doggo".to_string())));
        assert!(parse_id("").is_err());
    }
}
