//! Enveloped signatures over voucher XML.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::catalog::Company;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_OPEN: &str = "<ds:Signature";

/// Signs the `comprobante` XML on behalf of the issuing company.
pub trait DocumentSigner: Send + Sync {
    fn sign(&self, company: &Company, xml: &str) -> Result<String, SignatureError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("company {0} has no electronic signature key configured")]
    MissingKey(String),
    #[error("document has no root element to sign")]
    MalformedDocument,
    #[error("document is already signed")]
    AlreadySigned,
    #[error("signing failed: {0}")]
    Crypto(String),
}

/// Embeds a `ds:Signature` holding the SHA-256 digest of the document and an HMAC-SHA256 over
/// the signed info, keyed by the company's signature key.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestSigner;

impl DigestSigner {
    fn key(company: &Company) -> Result<&str, SignatureError> {
        company
            .signature_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SignatureError::MissingKey(company.id.0.clone()))
    }

    fn signed_info(digest: &str) -> String {
        format!(
            concat!(
                "<ds:SignedInfo>",
                "<ds:CanonicalizationMethod Algorithm=\"http://www.w3.org/TR/2001/REC-xml-c14n-20010315\"/>",
                "<ds:SignatureMethod Algorithm=\"http://www.w3.org/2001/04/xmldsig-more#hmac-sha256\"/>",
                "<ds:Reference URI=\"#comprobante\">",
                "<ds:Transforms><ds:Transform Algorithm=\"http://www.w3.org/2000/09/xmldsig#enveloped-signature\"/></ds:Transforms>",
                "<ds:DigestMethod Algorithm=\"http://www.w3.org/2001/04/xmlenc#sha256\"/>",
                "<ds:DigestValue>{}</ds:DigestValue>",
                "</ds:Reference>",
                "</ds:SignedInfo>"
            ),
            digest
        )
    }

    fn mac(key: &str, signed_info: &str) -> Result<String, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|err| SignatureError::Crypto(err.to_string()))?;
        mac.update(signed_info.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Recomputes digest and MAC of a signed document.
    pub fn verify(&self, company: &Company, signed_xml: &str) -> Result<bool, SignatureError> {
        let key = Self::key(company)?;
        let start = signed_xml
            .find(SIGNATURE_OPEN)
            .ok_or(SignatureError::MalformedDocument)?;
        let end_tag = "</ds:Signature>";
        let end = signed_xml[start..]
            .find(end_tag)
            .map(|offset| start + offset + end_tag.len())
            .ok_or(SignatureError::MalformedDocument)?;

        let unsigned = format!("{}{}", &signed_xml[..start], &signed_xml[end..]);
        let digest = BASE64.encode(Sha256::digest(unsigned.as_bytes()));
        let signed_info = Self::signed_info(&digest);
        let expected = format!(
            "<ds:SignatureValue>{}</ds:SignatureValue>",
            Self::mac(key, &signed_info)?
        );
        let block = &signed_xml[start..end];
        Ok(block.contains(&signed_info) && block.contains(&expected))
    }
}

impl DocumentSigner for DigestSigner {
    fn sign(&self, company: &Company, xml: &str) -> Result<String, SignatureError> {
        let key = Self::key(company)?;
        if xml.contains(SIGNATURE_OPEN) {
            return Err(SignatureError::AlreadySigned);
        }
        let insert_at = xml.rfind("</").ok_or(SignatureError::MalformedDocument)?;

        let digest = BASE64.encode(Sha256::digest(xml.as_bytes()));
        let signed_info = Self::signed_info(&digest);
        let value = Self::mac(key, &signed_info)?;

        let signature = format!(
            "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" Id=\"Signature\">{signed_info}<ds:SignatureValue>{value}</ds:SignatureValue></ds:Signature>"
        );

        let mut signed = String::with_capacity(xml.len() + signature.len());
        signed.push_str(&xml[..insert_at]);
        signed.push_str(&signature);
        signed.push_str(&xml[insert_at..]);
        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::choices::EnvironmentType;
    use crate::catalog::CompanyId;

    fn company(key: Option<&str>) -> Company {
        Company {
            id: CompanyId("cmp-1".to_string()),
            owner: None,
            ruc: "1790012345001".to_string(),
            company_name: "Comercial Andina S.A.".to_string(),
            commercial_name: "Andina".to_string(),
            main_address: "Quito".to_string(),
            establishment_address: "Quito".to_string(),
            establishment_code: "001".to_string(),
            issuing_point_code: "001".to_string(),
            special_taxpayer: "000".to_string(),
            obligated_accounting: false,
            environment: EnvironmentType::Test,
            emission_type: Default::default(),
            retention_agent: false,
            regime: Default::default(),
            tax_percentage: Default::default(),
            email: String::new(),
            mobile: None,
            signature_key: key.map(str::to_string),
        }
    }

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?><factura id="comprobante" version="1.0.0"><infoTributaria><ruc>1790012345001</ruc></infoTributaria></factura>"#;

    #[test]
    fn signature_is_embedded_before_root_close() {
        let signer = DigestSigner;
        let signed = signer.sign(&company(Some("secret")), DOC).expect("signs");
        assert!(signed.ends_with("</ds:Signature></factura>"));
        assert!(signer.verify(&company(Some("secret")), &signed).expect("verifies"));
        assert!(!signer.verify(&company(Some("other")), &signed).expect("verifies"));
    }

    #[test]
    fn tampering_breaks_verification() {
        let signer = DigestSigner;
        let signed = signer.sign(&company(Some("secret")), DOC).expect("signs");
        let tampered = signed.replace("1790012345001", "1790012345002");
        assert!(!signer.verify(&company(Some("secret")), &tampered).expect("verifies"));
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = DigestSigner.sign(&company(Some("  ")), DOC).expect_err("no key");
        assert_eq!(err, SignatureError::MissingKey("cmp-1".to_string()));
    }
}
