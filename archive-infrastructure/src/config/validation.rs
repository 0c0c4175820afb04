use anyhow::{anyhow, Result};

pub fn validate_endpoint(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("endpoint is empty"));
    }
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(anyhow!("endpoint must be an http(s) URL, got {:?}", value));
    }
    Ok(())
}

/// Names spliced into SQL must be plain identifiers.
pub fn validate_identifier(label: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(anyhow!("{} must be a plain identifier, got {:?}", label, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(validate_identifier("schema", "sui_devnet").is_ok());
        assert!(validate_identifier("schema", "").is_err());
        assert!(validate_identifier("schema", "1abc").is_err());
        assert!(validate_identifier("schema", "db; DROP TABLE x").is_err());
    }

    #[test]
    fn endpoints() {
        assert!(validate_endpoint("https://fullnode.devnet.sui.io").is_ok());
        assert!(validate_endpoint("fullnode.devnet.sui.io").is_err());
    }
}
