use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use odoo_rpc::Value;

use crate::api::ApiError;
use crate::session::Session;

const CONTACT_FIELDS: &[&str] = &["name", "email", "phone", "mobile", "image_1920"];

/// Every contact, with the image field normalized for JSON transport:
/// already-encoded text passes through, raw bytes are base64-encoded, and
/// anything else (missing, or the remote's `false` placeholder) becomes an
/// explicit null. The key is never omitted.
pub async fn contacts(session: &Session) -> Result<Vec<Value>, ApiError> {
    let mut contacts = session
        .search_read("res.partner", Value::Array(vec![]), CONTACT_FIELDS)
        .await?;

    for contact in contacts.iter_mut() {
        let Some(map) = contact.as_struct_mut() else {
            continue;
        };
        let image = match map.remove("image_1920") {
            Some(Value::Str(text)) if !text.is_empty() => Value::Str(text),
            Some(Value::Base64(bytes)) if !bytes.is_empty() => Value::Str(BASE64.encode(bytes)),
            _ => Value::Nil,
        };
        map.insert("image_1920".to_string(), image);
    }

    Ok(contacts)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use odoo_rpc::mock::{MockConnector, MockRpc};
    use odoo_rpc::Value;

    use super::contacts;
    use crate::connection::ConnectionContext;
    use crate::session::Session;

    fn contact(name: &str, image: Option<Value>) -> Value {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::Int(1));
        map.insert("name".to_string(), name.into());
        if let Some(image) = image {
            map.insert("image_1920".to_string(), image);
        }
        Value::Struct(map)
    }

    async fn session(rpc: &MockRpc) -> Session {
        let connector = MockConnector::new(rpc.clone());
        let context = ConnectionContext {
            url: "http://odoo.example.com:8069".to_string(),
            db: "master".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        Session::open(&connector, &context).await.unwrap()
    }

    #[tokio::test]
    async fn image_handling_covers_text_bytes_and_absent() {
        let rpc = MockRpc::new().with_uid(7).respond(
            "res.partner",
            "search_read",
            Value::Array(vec![
                contact("text", Some(Value::Str("YWxyZWFkeQ==".into()))),
                contact("bytes", Some(Value::Base64(b"raw".to_vec()))),
                contact("unset", Some(Value::Bool(false))),
                contact("missing", None),
            ]),
        );
        let session = session(&rpc).await;

        let result = contacts(&session).await.unwrap();

        assert_eq!(
            result[0].get("image_1920"),
            Some(&Value::Str("YWxyZWFkeQ==".into()))
        );
        assert_eq!(
            result[1].get("image_1920"),
            Some(&Value::Str("cmF3".into()))
        );
        // The unset placeholder and the missing field both become explicit
        // nulls; the key is present on every contact.
        assert_eq!(result[2].get("image_1920"), Some(&Value::Nil));
        assert_eq!(result[3].get("image_1920"), Some(&Value::Nil));
    }
}
