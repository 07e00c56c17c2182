//! Submission validation

use aeroreach_shared::{
    dispatch::{MAX_REQUESTER_AGE, MAX_TEXT_LEN},
    triage, DispatchError, DispatchResult, NewRequest,
};

fn invalid(message: impl Into<String>) -> DispatchError {
    DispatchError::Validation(message.into())
}

fn required_text(field: &str, value: &str) -> DispatchResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    bounded_text(field, value)
}

fn bounded_text(field: &str, value: &str) -> DispatchResult<String> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(invalid(format!(
            "{field} exceeds {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(value.to_string())
}

/// Check a submission and return it with text fields trimmed.
///
/// Unrecognized injury types are accepted; triage treats them as routine.
pub fn validate(fields: NewRequest) -> DispatchResult<NewRequest> {
    let name = required_text("name", &fields.name)?;
    let location = required_text("location", &fields.location)?;

    if fields.age > MAX_REQUESTER_AGE {
        return Err(invalid(format!("age {} is out of range", fields.age)));
    }

    if let Some(coordinates) = fields.coordinates {
        if !coordinates.is_valid() {
            return Err(invalid(format!(
                "coordinates ({}, {}) are out of range",
                coordinates.lat, coordinates.lng
            )));
        }
    }

    if let Some(category) = triage::category_of(fields.injury_type) {
        if category != fields.injury_category {
            return Err(invalid(format!(
                "{} is not a {} injury",
                fields.injury_type.label(),
                fields.injury_category.label()
            )));
        }
    }

    let injury_description = match fields.injury_description.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(text) => Some(bounded_text("injury description", text)?),
    };

    let user_id = fields
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    Ok(NewRequest {
        user_id,
        name,
        location,
        injury_description,
        ..fields
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::submission;
    use aeroreach_shared::{Coordinates, InjuryCategory, InjuryType};

    #[test]
    fn test_valid_submission_is_trimmed() {
        let mut fields = submission(InjuryType::HeavyBleeding);
        fields.name = "  Sarah Johnson ".into();
        fields.injury_description = Some("   ".into());
        fields.user_id = Some(" user-7 ".into());

        let clean = validate(fields).unwrap();
        assert_eq!(clean.name, "Sarah Johnson");
        assert_eq!(clean.injury_description, None);
        assert_eq!(clean.user_id.as_deref(), Some("user-7"));
    }

    #[test]
    fn test_missing_fields() {
        let mut fields = submission(InjuryType::Other);
        fields.name = " ".into();
        assert!(matches!(validate(fields), Err(DispatchError::Validation(_))));

        let mut fields = submission(InjuryType::Other);
        fields.location = String::new();
        assert!(matches!(validate(fields), Err(DispatchError::Validation(_))));
    }

    #[test]
    fn test_bounds() {
        let mut fields = submission(InjuryType::Other);
        fields.age = 131;
        assert!(validate(fields).is_err());

        let mut fields = submission(InjuryType::Other);
        fields.coordinates = Some(Coordinates { lat: 91.0, lng: 0.0 });
        assert!(validate(fields).is_err());

        let mut fields = submission(InjuryType::Other);
        fields.injury_description = Some("x".repeat(MAX_TEXT_LEN + 1));
        assert!(validate(fields).is_err());
    }

    #[test]
    fn test_category_must_match_injury() {
        let mut fields = submission(InjuryType::ChronicDiabetic);
        fields.injury_category = InjuryCategory::Trauma;
        assert!(validate(fields).is_err());

        // Unknown types are filed under whatever category the form sent
        let mut fields = submission(InjuryType::Unknown);
        fields.injury_category = InjuryCategory::Trauma;
        assert!(validate(fields).is_ok());
    }
}
