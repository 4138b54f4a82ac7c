//! Mapping from backend records to the local profile shape.

use farmacia_core::{Gender, PhoneNumber};

use crate::models::session::{ProfileRecord, RemoteUser};
use crate::models::user::ProfileUpdate;

/// Map a `profiles` row, filling gaps from the account record.
#[must_use]
pub fn profile_from_record(user: &RemoteUser, record: &ProfileRecord) -> ProfileUpdate {
    let metadata = &user.user_metadata;
    let update = ProfileUpdate {
        id: Some(record.id.to_string()),
        name: non_empty(record.first_name.as_ref()).or_else(|| non_empty(metadata.first_name.as_ref())),
        surname: non_empty(record.last_name.as_ref()).or_else(|| non_empty(metadata.last_name.as_ref())),
        email: non_empty(record.email.as_ref()).or_else(|| non_empty(user.email.as_ref())),
        id_type: non_empty(record.document_type.as_ref()),
        document_number: non_empty(record.document_number.as_ref()),
        gender: parse_gender(record.gender.as_deref()),
        avatar_url: non_empty(record.avatar_url.as_ref()),
        ..ProfileUpdate::default()
    };

    let phone = non_empty(record.phone.as_ref())
        .or_else(|| non_empty(user.phone.as_ref()))
        .or_else(|| non_empty(metadata.phone.as_ref()));
    with_phone(update, phone.as_deref())
}

/// Map the account record alone, for when no `profiles` row is available.
#[must_use]
pub fn profile_from_metadata(user: &RemoteUser) -> ProfileUpdate {
    let metadata = &user.user_metadata;
    let update = ProfileUpdate {
        id: Some(user.id.to_string()),
        name: non_empty(metadata.first_name.as_ref()),
        surname: non_empty(metadata.last_name.as_ref()),
        email: non_empty(user.email.as_ref()),
        id_type: non_empty(metadata.document_type.as_ref()),
        document_number: non_empty(metadata.document_number.as_ref()),
        gender: parse_gender(metadata.gender.as_deref()),
        avatar_url: non_empty(metadata.avatar_url.as_ref()),
        ..ProfileUpdate::default()
    };

    let phone = non_empty(metadata.phone.as_ref()).or_else(|| non_empty(user.phone.as_ref()));
    with_phone(update, phone.as_deref())
}

fn with_phone(update: ProfileUpdate, phone: Option<&str>) -> ProfileUpdate {
    match phone {
        Some(raw) => update.with_phone(PhoneNumber::split(raw)),
        None => update,
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn parse_gender(value: Option<&str>) -> Option<Gender> {
    value.and_then(|g| g.parse().ok())
}
