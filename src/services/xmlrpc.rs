//! XML-RPC values over `quick-xml`.
//!
//! Covers what the OpenSubtitles API exchanges: method calls with scalar,
//! array and struct parameters, and responses or faults built from the
//! standard value types.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

/// An XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    Str(String),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    /// Build a struct from key/value pairs.
    pub fn structure<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Struct(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Member of a struct.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }

    /// Integer value, also accepting numeric strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Scalar rendered as text: strings as is, numbers formatted.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Serialize a method call.
pub fn method_call(method: &str, params: &[Value]) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(xml_error)?;
    start(&mut writer, "methodCall")?;
    text_element(&mut writer, "methodName", method)?;
    start(&mut writer, "params")?;
    for param in params {
        start(&mut writer, "param")?;
        write_value(&mut writer, param)?;
        end(&mut writer, "param")?;
    }
    end(&mut writer, "params")?;
    end(&mut writer, "methodCall")?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

/// Parse a method response, turning a fault into an error.
pub fn parse_response(xml: &str) -> Result<Value> {
    let root = read_document(xml)?;
    if root.name != "methodResponse" {
        return Err(Error::Xmlrpc(format!(
            "expected <methodResponse>, found <{}>",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let fault = fault
            .child("value")
            .ok_or_else(|| Error::Xmlrpc("fault without value".to_string()))
            .and_then(read_value)?;
        let code = fault.get("faultCode").and_then(Value::as_i64).unwrap_or(0);
        let message = fault
            .get("faultString")
            .and_then(Value::to_text)
            .unwrap_or_default();
        return Err(Error::RemoteProtocol(format!("fault {}: {}", code, message)));
    }

    match root
        .child("params")
        .and_then(|params| params.child("param"))
        .and_then(|param| param.child("value"))
    {
        Some(value) => read_value(value),
        None => Ok(Value::Nil),
    }
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Xmlrpc(e.to_string())
}

fn start(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    start(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    end(writer, name)
}

fn write_value(writer: &mut Writer<Vec<u8>>, value: &Value) -> Result<()> {
    start(writer, "value")?;
    match value {
        Value::Int(i) => text_element(writer, "int", &i.to_string())?,
        Value::Bool(b) => text_element(writer, "boolean", if *b { "1" } else { "0" })?,
        Value::Double(d) => text_element(writer, "double", &d.to_string())?,
        Value::Str(s) => text_element(writer, "string", s)?,
        Value::Base64(bytes) => text_element(writer, "base64", &STANDARD.encode(bytes))?,
        Value::Array(items) => {
            start(writer, "array")?;
            start(writer, "data")?;
            for item in items {
                write_value(writer, item)?;
            }
            end(writer, "data")?;
            end(writer, "array")?;
        }
        Value::Struct(members) => {
            start(writer, "struct")?;
            for (name, member) in members {
                start(writer, "member")?;
                text_element(writer, "name", name)?;
                write_value(writer, member)?;
                end(writer, "member")?;
            }
            end(writer, "struct")?;
        }
        Value::Nil => writer
            .write_event(Event::Empty(BytesStart::new("nil")))
            .map_err(xml_error)?,
    }
    end(writer, "value")
}

/// Element of a parsed document.
#[derive(Debug)]
struct Element {
    name: String,
    children: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn new(start: &BytesStart) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(xml_error)?
            .to_string();
        Ok(Self {
            name,
            children: Vec::new(),
        })
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    /// Concatenated text content, CDATA included.
    fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

/// Read a whole document into its root element.
///
/// Declarations, doctypes, comments and processing instructions are skipped.
fn read_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let finished = match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => {
                stack.push(Element::new(&start)?);
                None
            }
            Event::Empty(start) => attach(&mut stack, Element::new(&start)?),
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Xmlrpc("unbalanced end tag".to_string()))?;
                attach(&mut stack, element)
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let text = text.unescape().map_err(xml_error)?;
                    parent.children.push(Node::Text(text.into_owned()));
                }
                None
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8(data.into_inner().into_owned()).map_err(xml_error)?;
                    parent.children.push(Node::Text(text));
                }
                None
            }
            Event::Eof => return Err(Error::Xmlrpc("unexpected end of document".to_string())),
            _ => None,
        };

        if let Some(root) = finished {
            return Ok(root);
        }
    }
}

/// Add a closed element to its parent, or return it when it is the root.
fn attach(stack: &mut [Element], element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            None
        }
        None => Some(element),
    }
}

/// Interpret a `<value>` element.
fn read_value(element: &Element) -> Result<Value> {
    // untyped values are strings
    let Some(typed) = element.elements().next() else {
        return Ok(Value::Str(element.text()));
    };
    let text = typed.text();

    let value = match typed.name.as_str() {
        "i4" | "i8" | "int" => Value::Int(
            text.trim()
                .parse()
                .map_err(|_| Error::Xmlrpc(format!("bad integer {:?}", text)))?,
        ),
        "boolean" => Value::Bool(text.trim() == "1"),
        "double" => Value::Double(
            text.trim()
                .parse()
                .map_err(|_| Error::Xmlrpc(format!("bad double {:?}", text)))?,
        ),
        "string" | "dateTime.iso8601" => Value::Str(text),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            Value::Base64(
                STANDARD
                    .decode(compact)
                    .map_err(|e| Error::Xmlrpc(format!("bad base64: {}", e)))?,
            )
        }
        "nil" => Value::Nil,
        "array" => {
            let items = match typed.child("data") {
                Some(data) => data
                    .elements()
                    .filter(|item| item.name == "value")
                    .map(read_value)
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.elements().filter(|m| m.name == "member") {
                let name = member
                    .child("name")
                    .map(Element::text)
                    .ok_or_else(|| Error::Xmlrpc("struct member without name".to_string()))?;
                let value = member
                    .child("value")
                    .ok_or_else(|| Error::Xmlrpc(format!("member {} without value", name)))?;
                members.insert(name, read_value(value)?);
            }
            Value::Struct(members)
        }
        other => return Err(Error::Xmlrpc(format!("unknown value type <{}>", other))),
    };
    Ok(value)
}
