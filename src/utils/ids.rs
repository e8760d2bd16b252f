use mongodb::bson::oid::ObjectId;

use super::error::AppError;

/// Parses a hex ObjectId from a path segment, mapping failures to a 400.
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

pub fn hex_id(id: &Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

/// Random identifier for embedded sub-documents (addresses, cart lines, reviews).
pub fn new_sub_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_id() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "product").unwrap(), id);

        match parse_object_id("not-an-id", "product") {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Invalid product ID"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_hex_id_of_missing_id_is_empty() {
        assert_eq!(hex_id(&None), "");
    }
}
