use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::RpcError;

/// A value on the XML-RPC wire.
///
/// The remote encodes absent scalar fields as `Bool(false)` and relation
/// fields as `[id, display_name]` pairs; callers should not assume a field
/// carries the variant its name suggests.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    Str(String),
    /// Raw ISO-8601 text from a `dateTime.iso8601` element, unparsed.
    DateTime(String),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::DateTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    /// Struct field access; `None` for non-structs and missing keys alike.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_struct().and_then(|map| map.get(key))
    }

    /// Remote-style truthiness: zero, false, empty and nil are all falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Bool(b) => *b,
            Value::Double(d) => *d != 0.0,
            Value::Str(s) | Value::DateTime(s) => !s.is_empty(),
            Value::Base64(bytes) => !bytes.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Struct(map) => !map.is_empty(),
            Value::Nil => false,
        }
    }

    /// A `[field, operator, operand]` domain clause.
    pub fn clause(field: &str, operator: &str, operand: Value) -> Value {
        Value::Array(vec![field.into(), operator.into(), operand])
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> serde_json::Value {
        match value {
            Value::Int(i) => serde_json::Value::from(i),
            Value::Bool(b) => serde_json::Value::from(b),
            Value::Double(d) => serde_json::Number::from_f64(d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) | Value::DateTime(s) => serde_json::Value::from(s),
            Value::Base64(bytes) => serde_json::Value::from(BASE64.encode(bytes)),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Struct(map) => serde_json::Value::Object(
                map.into_iter().map(|(key, val)| (key, val.into())).collect(),
            ),
            Value::Nil => serde_json::Value::Null,
        }
    }
}

/// Serialize a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(r#"<?xml version="1.0"?>"#);
    out.push_str("<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(i) => {
            out.push_str(&format!("<int>{i}</int>"));
        }
        Value::Bool(b) => {
            out.push_str(&format!("<boolean>{}</boolean>", u8::from(*b)));
        }
        Value::Double(d) => {
            out.push_str(&format!("<double>{d}</double>"));
        }
        Value::Str(s) => {
            out.push_str(&format!("<string>{}</string>", escape(s)));
        }
        Value::DateTime(s) => {
            out.push_str(&format!("<dateTime.iso8601>{}</dateTime.iso8601>", escape(s)));
        }
        Value::Base64(bytes) => {
            out.push_str(&format!("<base64>{}</base64>", BASE64.encode(bytes)));
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(map) => {
            out.push_str("<struct>");
            for (name, member) in map {
                out.push_str(&format!("<member><name>{}</name>", escape(name)));
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => {
            out.push_str("<nil/>");
        }
    }
    out.push_str("</value>");
}

/// Deserialize a `methodResponse` document into its single result value.
/// A `<fault>` response decodes into `RpcError::Fault`.
pub fn decode_response(body: &str) -> Result<Value, RpcError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) => match e.name().as_ref() {
                b"methodResponse" | b"params" | b"param" => continue,
                b"value" => return read_value(&mut reader),
                b"fault" => return Err(read_fault(&mut reader)?),
                other => {
                    return Err(RpcError::Decode(format!(
                        "unexpected element <{}> in method response",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
            Event::Eof => return Err(RpcError::Decode("truncated method response".into())),
            _ => continue,
        }
    }
}

fn read_fault(reader: &mut Reader<&[u8]>) -> Result<RpcError, RpcError> {
    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) if e.name().as_ref() == b"value" => {
                let fault = read_value(reader)?;
                let code = fault
                    .get("faultCode")
                    .and_then(Value::as_i64)
                    .unwrap_or_default() as i32;
                let message = fault
                    .get("faultString")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                return Ok(RpcError::Fault { code, message });
            }
            Event::Eof => return Err(RpcError::Decode("truncated fault response".into())),
            _ => continue,
        }
    }
}

/// Parse the contents of a `<value>` element, consuming its closing tag.
/// An untyped `<value>text</value>` carries a string, per the protocol.
fn read_value(reader: &mut Reader<&[u8]>) -> Result<Value, RpcError> {
    let mut text: Option<String> = None;
    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Text(t) => {
                text = Some(t.unescape().map_err(decode_err)?.into_owned());
            }
            Event::Start(e) => {
                let value = match e.name().as_ref() {
                    b"string" => Value::Str(read_text(reader, b"string")?),
                    b"int" | b"i4" | b"i8" => {
                        let raw = read_text(reader, e.name().as_ref())?;
                        Value::Int(raw.trim().parse().map_err(|_| {
                            RpcError::Decode(format!("invalid integer literal {raw:?}"))
                        })?)
                    }
                    b"boolean" => {
                        let raw = read_text(reader, b"boolean")?;
                        Value::Bool(raw.trim() == "1")
                    }
                    b"double" => {
                        let raw = read_text(reader, b"double")?;
                        Value::Double(raw.trim().parse().map_err(|_| {
                            RpcError::Decode(format!("invalid double literal {raw:?}"))
                        })?)
                    }
                    b"dateTime.iso8601" => Value::DateTime(read_text(reader, b"dateTime.iso8601")?),
                    b"base64" => {
                        let raw = read_text(reader, b"base64")?;
                        let cleaned: String = raw.split_whitespace().collect();
                        Value::Base64(BASE64.decode(cleaned.as_bytes()).map_err(|e| {
                            RpcError::Decode(format!("invalid base64 payload: {e}"))
                        })?)
                    }
                    b"array" => read_array(reader)?,
                    b"struct" => read_struct(reader)?,
                    b"nil" => {
                        expect_end(reader, b"nil")?;
                        Value::Nil
                    }
                    other => {
                        return Err(RpcError::Decode(format!(
                            "unknown value type <{}>",
                            String::from_utf8_lossy(other)
                        )))
                    }
                };
                expect_end(reader, b"value")?;
                return Ok(value);
            }
            Event::Empty(e) => {
                let value = match e.name().as_ref() {
                    b"nil" => Value::Nil,
                    b"string" => Value::Str(String::new()),
                    b"base64" => Value::Base64(Vec::new()),
                    b"array" => Value::Array(Vec::new()),
                    b"struct" => Value::Struct(BTreeMap::new()),
                    other => {
                        return Err(RpcError::Decode(format!(
                            "empty <{}> element is not a value",
                            String::from_utf8_lossy(other)
                        )))
                    }
                };
                expect_end(reader, b"value")?;
                return Ok(value);
            }
            Event::End(e) if e.name().as_ref() == b"value" => {
                return Ok(Value::Str(text.unwrap_or_default()));
            }
            Event::Eof => return Err(RpcError::Decode("truncated value element".into())),
            _ => continue,
        }
    }
}

fn read_array(reader: &mut Reader<&[u8]>) -> Result<Value, RpcError> {
    let mut items = Vec::new();
    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) => match e.name().as_ref() {
                b"data" => continue,
                b"value" => items.push(read_value(reader)?),
                other => {
                    return Err(RpcError::Decode(format!(
                        "unexpected element <{}> inside array",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"data" => continue,
            Event::End(e) => match e.name().as_ref() {
                b"data" => continue,
                b"array" => return Ok(Value::Array(items)),
                other => {
                    return Err(RpcError::Decode(format!(
                        "unbalanced </{}> inside array",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
            Event::Eof => return Err(RpcError::Decode("truncated array element".into())),
            _ => continue,
        }
    }
}

fn read_struct(reader: &mut Reader<&[u8]>) -> Result<Value, RpcError> {
    let mut map = BTreeMap::new();
    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) => match e.name().as_ref() {
                b"member" => {
                    let (name, value) = read_member(reader)?;
                    map.insert(name, value);
                }
                other => {
                    return Err(RpcError::Decode(format!(
                        "unexpected element <{}> inside struct",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
            Event::End(e) if e.name().as_ref() == b"struct" => return Ok(Value::Struct(map)),
            Event::Eof => return Err(RpcError::Decode("truncated struct element".into())),
            _ => continue,
        }
    }
}

fn read_member(reader: &mut Reader<&[u8]>) -> Result<(String, Value), RpcError> {
    let mut name: Option<String> = None;
    let mut value: Option<Value> = None;
    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) => match e.name().as_ref() {
                b"name" => name = Some(read_text(reader, b"name")?),
                b"value" => value = Some(read_value(reader)?),
                other => {
                    return Err(RpcError::Decode(format!(
                        "unexpected element <{}> inside struct member",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"name" => name = Some(String::new()),
            Event::End(e) if e.name().as_ref() == b"member" => {
                let name =
                    name.ok_or_else(|| RpcError::Decode("struct member without a name".into()))?;
                let value =
                    value.ok_or_else(|| RpcError::Decode("struct member without a value".into()))?;
                return Ok((name, value));
            }
            Event::Eof => return Err(RpcError::Decode("truncated struct member".into())),
            _ => continue,
        }
    }
}

/// Accumulate the text content of a scalar element up to its closing tag.
fn read_text(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<String, RpcError> {
    let mut out = String::new();
    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Text(t) => out.push_str(&t.unescape().map_err(decode_err)?),
            Event::CData(c) => {
                out.push_str(&String::from_utf8_lossy(c.as_ref()));
            }
            Event::End(e) if e.name().as_ref() == tag => return Ok(out),
            Event::Eof => {
                return Err(RpcError::Decode(format!(
                    "truncated <{}> element",
                    String::from_utf8_lossy(tag)
                )))
            }
            _ => continue,
        }
    }
}

fn expect_end(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<(), RpcError> {
    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::End(e) if e.name().as_ref() == tag => return Ok(()),
            Event::Text(_) => continue,
            Event::Eof => {
                return Err(RpcError::Decode(format!(
                    "missing </{}> close tag",
                    String::from_utf8_lossy(tag)
                )))
            }
            other => {
                return Err(RpcError::Decode(format!(
                    "expected </{}>, found {other:?}",
                    String::from_utf8_lossy(tag)
                )))
            }
        }
    }
}

fn decode_err(error: quick_xml::Error) -> RpcError {
    RpcError::Decode(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{decode_response, encode_call, Value};
    use crate::error::RpcError;

    #[test]
    fn encodes_authenticate_call() {
        let encoded = encode_call(
            "authenticate",
            &[
                "master".into(),
                "admin".into(),
                "s3cret & more".into(),
                Value::Struct(BTreeMap::new()),
            ],
        );

        assert_eq!(
            encoded,
            concat!(
                r#"<?xml version="1.0"?>"#,
                "<methodCall><methodName>authenticate</methodName><params>",
                "<param><value><string>master</string></value></param>",
                "<param><value><string>admin</string></value></param>",
                "<param><value><string>s3cret &amp; more</string></value></param>",
                "<param><value><struct></struct></value></param>",
                "</params></methodCall>",
            )
        );
    }

    #[test]
    fn encodes_nested_arrays_and_structs() {
        let domain = Value::Array(vec![Value::clause(
            "user_ids",
            "in",
            Value::Array(vec![Value::Int(7)]),
        )]);
        let encoded = encode_call("execute_kw", &[domain]);

        assert!(encoded.contains(
            "<array><data><value><array><data>\
             <value><string>user_ids</string></value>\
             <value><string>in</string></value>\
             <value><array><data><value><int>7</int></value></data></array></value>\
             </data></array></value></data></array>"
        ));
    }

    #[test]
    fn decodes_integer_response() {
        let body = r#"<?xml version="1.0"?>
            <methodResponse><params><param>
                <value><int>2</int></value>
            </param></params></methodResponse>"#;

        assert_eq!(decode_response(body).unwrap(), Value::Int(2));
    }

    #[test]
    fn decodes_failed_authentication_as_false() {
        let body = r#"<?xml version="1.0"?>
            <methodResponse><params><param>
                <value><boolean>0</boolean></value>
            </param></params></methodResponse>"#;

        assert_eq!(decode_response(body).unwrap(), Value::Bool(false));
    }

    #[test]
    fn decodes_record_array() {
        // The shape search_read returns: structs with i4 ids, strings,
        // false placeholders and relation pairs.
        let body = r#"<?xml version="1.0"?>
            <methodResponse><params><param><value><array><data>
                <value><struct>
                    <member><name>id</name><value><i4>1</i4></value></member>
                    <member><name>name</name><value><string>Ship it</string></value></member>
                    <member><name>description</name><value><boolean>0</boolean></value></member>
                    <member><name>project_id</name><value><array><data>
                        <value><i4>10</i4></value>
                        <value><string>P1</string></value>
                    </data></array></value></member>
                </struct></value>
            </data></array></value></param></params></methodResponse>"#;

        let decoded = decode_response(body).unwrap();
        let records = decoded.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(
            records[0].get("name").and_then(Value::as_str),
            Some("Ship it")
        );
        assert_eq!(records[0].get("description"), Some(&Value::Bool(false)));
        assert_eq!(
            records[0].get("project_id"),
            Some(&Value::Array(vec![Value::Int(10), "P1".into()]))
        );
    }

    #[test]
    fn decodes_untyped_and_empty_values() {
        let untyped = r#"<methodResponse><params><param>
            <value>bare text</value>
        </param></params></methodResponse>"#;
        assert_eq!(decode_response(untyped).unwrap(), Value::Str("bare text".into()));

        let empty = r#"<methodResponse><params><param>
            <value><string/></value>
        </param></params></methodResponse>"#;
        assert_eq!(decode_response(empty).unwrap(), Value::Str(String::new()));

        let nil = r#"<methodResponse><params><param>
            <value><nil/></value>
        </param></params></methodResponse>"#;
        assert_eq!(decode_response(nil).unwrap(), Value::Nil);
    }

    #[test]
    fn decodes_base64_payload() {
        let body = r#"<methodResponse><params><param>
            <value><base64>aGVsbG8=</base64></value>
        </param></params></methodResponse>"#;

        assert_eq!(
            decode_response(body).unwrap(),
            Value::Base64(b"hello".to_vec())
        );
    }

    #[test]
    fn decodes_fault_into_error() {
        let body = r#"<?xml version="1.0"?>
            <methodResponse><fault><value><struct>
                <member><name>faultCode</name><value><int>1</int></value></member>
                <member><name>faultString</name><value><string>Invalid field on model</string></value></member>
            </struct></value></fault></methodResponse>"#;

        match decode_response(body) {
            Err(RpcError::Fault { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "Invalid field on model");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage_and_truncation() {
        assert!(matches!(
            decode_response("this is not xml at all"),
            Err(RpcError::Decode(_))
        ));
        assert!(matches!(
            decode_response("<methodResponse><params><param><value><int>3"),
            Err(RpcError::Decode(_))
        ));
    }

    #[test]
    fn converts_values_to_json() {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::Int(5));
        map.insert("name".to_string(), Value::Str("Urgent".into()));
        map.insert("image".to_string(), Value::Base64(b"img".to_vec()));
        map.insert("phone".to_string(), Value::Nil);

        let json: serde_json::Value = Value::Struct(map).into();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 5,
                "name": "Urgent",
                "image": "aW1n",
                "phone": null,
            })
        );
    }

    #[test]
    fn truthiness_matches_remote_conventions() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Int(2).is_truthy());
        assert!(Value::Str("admin".into()).is_truthy());
    }
}
