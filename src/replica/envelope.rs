//! Blob envelopes
//!
//! Every blob is a JSON object with a `type` discriminator. A document root
//! names nothing; its own blob ref becomes the document id. Mutations and
//! permissions name the document they belong to.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ot::{decode_operation, encode_operation, Mutation, OtError};
use crate::permission::Permission;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    Document(DocumentRoot),
    Mutation(MutationEnvelope),
    Permission(PermissionEnvelope),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRoot {
    pub site: String,

    /// Keeps two roots created by the same site from sharing a ref
    pub nonce: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationEnvelope {
    pub doc: String,
    pub site: String,
    #[serde(default)]
    pub dep: Vec<String>,
    pub op: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEnvelope {
    pub doc: String,
    pub user: String,
    #[serde(deserialize_with = "deserialize_bits")]
    pub allow: u64,
    #[serde(deserialize_with = "deserialize_bits")]
    pub deny: u64,
    #[serde(default)]
    pub dep: Vec<String>,
}

/// Masks arrive signed from some writers; `-1` means every bit set
fn deserialize_bits<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawBits {
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawBits::deserialize(deserializer)? {
        RawBits::Unsigned(bits) => bits,
        RawBits::Signed(bits) => bits as u64,
    })
}

impl Envelope {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// The document this blob belongs to; a root belongs to itself
    pub fn document_id<'a>(&'a self, blob_id: &'a str) -> &'a str {
        match self {
            Envelope::Document(_) => blob_id,
            Envelope::Mutation(m) => &m.doc,
            Envelope::Permission(p) => &p.doc,
        }
    }
}

impl MutationEnvelope {
    pub fn from_mutation(doc: impl Into<String>, mutation: &Mutation) -> Result<Self, OtError> {
        Ok(Self {
            doc: doc.into(),
            site: mutation.site.clone(),
            dep: mutation.dependencies.clone(),
            op: encode_operation(&mutation.op)?,
        })
    }

    /// A mutation is named by the ref of the blob that carries it
    pub fn into_mutation(self, blob_id: &str) -> Result<Mutation, OtError> {
        let op = decode_operation(&self.op)?;
        Ok(Mutation::new(blob_id, self.site, self.dep, op))
    }
}

impl PermissionEnvelope {
    pub fn into_permission(self, blob_id: &str) -> Result<Permission, OtError> {
        Permission::new(blob_id, self.user, self.allow, self.deny, self.dep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::Operation;

    #[test]
    fn test_decode_mutation() {
        let bytes = br#"{"type":"mutation","doc":"d","site":"s1","dep":["a"],"op":{"$t":["hi",{"$s":2}]}}"#;
        let envelope = Envelope::decode(bytes).unwrap();
        assert_eq!(envelope.document_id("blob"), "d");

        let Envelope::Mutation(m) = envelope else {
            panic!("expected a mutation");
        };
        let mutation = m.into_mutation("blob").unwrap();
        assert_eq!(mutation.id, "blob");
        assert_eq!(mutation.dependencies, vec!["a".to_string()]);
        assert_eq!(
            mutation.op,
            Operation::string(vec![Operation::insert_text("hi"), Operation::Skip(2)])
        );
    }

    #[test]
    fn test_mutation_id_is_the_blob_ref() {
        let bytes = br#"{"type":"mutation","id":"forged","doc":"d","site":"s1","op":{"$t":["x"]}}"#;
        let Envelope::Mutation(m) = Envelope::decode(bytes).unwrap() else {
            panic!("expected a mutation");
        };
        assert_eq!(m.into_mutation("blob").unwrap().id, "blob");

        let mutation = Mutation::new("local", "s1", vec![], Operation::string(vec![Operation::insert_text("x")]));
        let encoded = Envelope::Mutation(MutationEnvelope::from_mutation("d", &mutation).unwrap())
            .encode()
            .unwrap();
        let value: Value = serde_json::from_slice(&encoded).unwrap();
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_signed_permission_masks() {
        let bytes = br#"{"type":"permission","doc":"d","user":"alice","allow":1,"deny":-1}"#;
        let Envelope::Permission(p) = Envelope::decode(bytes).unwrap() else {
            panic!("expected a permission");
        };
        assert_eq!(p.deny, u64::MAX);
        let permission = p.into_permission("blob").unwrap();
        assert_eq!(permission.allow, 1);
        assert!(permission.dependencies.is_empty());
    }

    #[test]
    fn test_root_is_its_own_document() {
        let root = Envelope::Document(DocumentRoot {
            site: "s1".to_string(),
            nonce: "n".to_string(),
        });
        let bytes = root.encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(decoded, root);
        assert_eq!(decoded.document_id("blob"), "blob");
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(Envelope::decode(br#"{"type":"keep","doc":"d"}"#).is_err());
        assert!(Envelope::decode(b"not json").is_err());
    }
}
