/// Shared name rules for namespaces, sets and repositories. Device ids are
/// looser since agents often use hardware identifiers.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    if name.len() > 64 {
        return Err("Name cannot exceed 64 characters".to_string());
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(
            "Name can only contain alphanumeric characters, hyphens, and underscores".to_string(),
        );
    }

    if name.starts_with('-') || name.starts_with('_') {
        return Err("Name cannot start with a hyphen or underscore".to_string());
    }

    Ok(())
}

pub fn validate_device_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("Device id cannot be empty".to_string());
    }

    if id.len() > 128 {
        return Err("Device id cannot exceed 128 characters".to_string());
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' || c == '.')
    {
        return Err("Device id contains invalid characters".to_string());
    }

    Ok(())
}
