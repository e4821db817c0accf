// Script run payloads for `InitiateClientOperationEx`
//
// A script run is a client operation whose `Param` is a base64 XML
// envelope. The client verifies the envelope by hashing the parameter
// block itself, so the block text and its digest have to match byte for
// byte: SHA-256 over the UTF-16LE encoding, uppercase hex.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use base64::Engine as _;
use quick_xml::Reader;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Parameter block embedded for scripts that take no parameters.
pub const EMPTY_PARAMETER_BLOCK: &str = "<ScriptParameters></ScriptParameters>";

const DEFAULT_PARAMETER_TYPE: &str = "System.String";

// ── Parameter schema ─────────────────────────────────────────────────

/// One `<ScriptParameter>` from a script's `ParamsDefinition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptParameterDef {
    pub name: String,
    #[serde(rename = "Type")]
    pub param_type: String,
    pub is_required: bool,
    pub is_hidden: bool,
    pub default_value: Option<String>,
    pub description: Option<String>,
}

/// Decoded `ParamsDefinition`, parameters in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptParameterSchema {
    pub parameters: Vec<ScriptParameterDef>,
}

impl ScriptParameterSchema {
    /// Decode the base64 `ParamsDefinition` property.
    pub fn decode(encoded: &str) -> Result<Self, Error> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::ParameterSchema(format!("invalid base64: {e}")))?;
        let text = decode_text(&bytes)?;
        Self::parse(&text)
    }

    /// Parse the schema XML text.
    pub fn parse(xml: &str) -> Result<Self, Error> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut parameters = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e) | Event::Empty(ref e))
                    if e.local_name().as_ref() == b"ScriptParameter" =>
                {
                    parameters.push(parameter_from_element(e)?);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::ParameterSchema(format!(
                        "malformed XML at byte {}: {e}",
                        reader.error_position()
                    )));
                }
            }
        }

        Ok(Self { parameters })
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Check supplied values against the schema before anything is sent.
    ///
    /// Every required parameter that is not hidden must be supplied, and
    /// every supplied name must be declared. Names compare case-insensitively.
    pub fn validate(&self, supplied: &BTreeMap<String, String>) -> Result<(), Error> {
        for name in supplied.keys() {
            if !self
                .parameters
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(name))
            {
                return Err(Error::UnknownScriptParameter { name: name.clone() });
            }
        }

        for param in &self.parameters {
            if param.is_required && !param.is_hidden && lookup(supplied, &param.name).is_none() {
                return Err(Error::MissingScriptParameter {
                    name: param.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Render the `<ScriptParameters>` block in schema order.
    ///
    /// Each parameter takes the supplied value, else its schema default.
    /// Parameters with neither are left out.
    pub fn build_parameter_xml(&self, supplied: &BTreeMap<String, String>) -> String {
        let mut xml = String::from("<ScriptParameters>");
        for param in &self.parameters {
            let Some(value) = lookup(supplied, &param.name).or(param.default_value.as_deref())
            else {
                continue;
            };
            let _ = write!(
                xml,
                "<ScriptParameter ParameterGroupGuid=\"\" ParameterGroupName=\"PG_\" \
                 ParameterName=\"{}\" ParameterType=\"{}\" ParameterValue=\"{}\"/>",
                escape(param.name.as_str()),
                escape(param.param_type.as_str()),
                escape(value),
            );
        }
        xml.push_str("</ScriptParameters>");
        xml
    }
}

fn lookup<'a>(supplied: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    supplied
        .get(name)
        .or_else(|| {
            supplied
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

fn parameter_from_element(element: &BytesStart<'_>) -> Result<ScriptParameterDef, Error> {
    let mut name = None;
    let mut param_type = None;
    let mut is_required = false;
    let mut is_hidden = false;
    let mut default_value = None;
    let mut description = None;

    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::ParameterSchema(format!("bad attribute: {e}")))?;
        let raw = std::str::from_utf8(&attr.value)
            .map_err(|e| Error::ParameterSchema(format!("attribute is not UTF-8: {e}")))?;
        let value = unescape(raw)
            .map_err(|e| Error::ParameterSchema(format!("bad attribute value: {e}")))?
            .into_owned();

        match attr.key.local_name().as_ref() {
            b"Name" => name = Some(value),
            b"Type" => param_type = Some(value),
            b"IsRequired" => is_required = parse_flag(&value),
            b"IsHidden" => is_hidden = parse_flag(&value),
            b"DefaultValue" => default_value = Some(value),
            b"Description" => description = Some(value),
            _ => {}
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::ParameterSchema("ScriptParameter without a Name".into()))?;

    Ok(ScriptParameterDef {
        name,
        param_type: param_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_PARAMETER_TYPE.to_owned()),
        is_required,
        is_hidden,
        default_value,
        description: description.filter(|d| !d.is_empty()),
    })
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Bytes to text: UTF-16LE when BOM-marked or NUL-interleaved, else UTF-8.
fn decode_text(bytes: &[u8]) -> Result<String, Error> {
    let utf16 = bytes.starts_with(&[0xFF, 0xFE])
        || (bytes.len() >= 2 && bytes.get(1) == Some(&0) && bytes.first() != Some(&0));

    if utf16 {
        let body = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
        if body.len() % 2 != 0 {
            return Err(Error::ParameterSchema("odd-length UTF-16 payload".into()));
        }
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units)
            .map_err(|e| Error::ParameterSchema(format!("invalid UTF-16: {e}")))
    } else {
        let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        String::from_utf8(body.to_vec())
            .map_err(|e| Error::ParameterSchema(format!("invalid UTF-8: {e}")))
    }
}

// ── Digest and envelope ──────────────────────────────────────────────

/// Uppercase hex SHA-256 over the UTF-16LE bytes of `xml`.
pub fn parameter_digest(xml: &str) -> String {
    let mut hasher = Sha256::new();
    for unit in xml.encode_utf16() {
        hasher.update(unit.to_le_bytes());
    }
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02X}");
            out
        })
}

/// The script identity fields the envelope repeats back to the client.
#[derive(Debug, Clone, Copy)]
pub struct ScriptIdentity<'a> {
    pub guid: &'a str,
    pub version: &'a str,
    pub script_type: u32,
    pub hash: &'a str,
}

/// Render the `<ScriptContent>` envelope.
///
/// `parameter_xml` is `None` for parameterless scripts, which get the empty
/// block and an empty group hash.
pub fn build_envelope(script: &ScriptIdentity<'_>, parameter_xml: Option<&str>) -> String {
    let (block, digest) = match parameter_xml {
        Some(xml) => (xml, parameter_digest(xml)),
        None => (EMPTY_PARAMETER_BLOCK, String::new()),
    };

    format!(
        "<ScriptContent ScriptGuid='{guid}'>\
         <ScriptVersion>{version}</ScriptVersion>\
         <ScriptType>{script_type}</ScriptType>\
         <ScriptHash ScriptHashAlg='SHA256'>{hash}</ScriptHash>\
         {block}\
         <ParameterGroupHash ParameterHashAlg='SHA256'>{digest}</ParameterGroupHash>\
         </ScriptContent>",
        guid = script.guid,
        version = script.version,
        script_type = script.script_type,
        hash = script.hash,
    )
}

/// Base64 of the envelope's UTF-8 bytes, ready for the `Param` field.
pub fn encode_envelope(script: &ScriptIdentity<'_>, parameter_xml: Option<&str>) -> String {
    base64::engine::general_purpose::STANDARD.encode(build_envelope(script, parameter_xml))
}
