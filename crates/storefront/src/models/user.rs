//! User profile domain types.
//!
//! These are the shapes the account screens read and the user store persists.
//! Field names serialize in camelCase so data written by earlier storefront
//! builds still loads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use farmacia_core::{
    AddressId, FavoriteId, Gender, PhoneNumber, Price, PurchaseId, PurchaseStatus,
    phone::{DEFAULT_COUNTRY_CODE, DEFAULT_PREFIX},
};

/// Document type preselected at registration.
pub const DEFAULT_ID_TYPE: &str = "CÉDULA DE IDENTIDAD";

/// The signed-in customer's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Identity-provider user ID.
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone_country_code: String,
    pub phone_prefix: String,
    pub phone_number: String,
    pub id_type: String,
    pub document_number: String,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            surname: String::new(),
            email: String::new(),
            phone_country_code: DEFAULT_COUNTRY_CODE.to_owned(),
            phone_prefix: DEFAULT_PREFIX.to_owned(),
            phone_number: String::new(),
            id_type: DEFAULT_ID_TYPE.to_owned(),
            document_number: String::new(),
            gender: Gender::default(),
            avatar_url: None,
        }
    }
}

impl UserProfile {
    /// "Name Surname", trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_owned()
    }

    /// The phone as a structured number.
    #[must_use]
    pub fn phone(&self) -> PhoneNumber {
        PhoneNumber {
            country_code: self.phone_country_code.clone(),
            prefix: self.phone_prefix.clone(),
            number: self.phone_number.clone(),
        }
    }

    /// Two-letter initials for the avatar placeholder.
    #[must_use]
    pub fn initials(&self) -> String {
        [&self.name, &self.surname]
            .iter()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

/// A partial profile; `Some` fields overwrite, `None` fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub id: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub phone_country_code: Option<String>,
    pub phone_prefix: Option<String>,
    pub phone_number: Option<String>,
    pub id_type: Option<String>,
    pub document_number: Option<String>,
    pub gender: Option<Gender>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    /// Merge the set fields into `profile`.
    pub fn apply_to(self, profile: &mut UserProfile) {
        fn merge<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        merge(&mut profile.id, self.id);
        merge(&mut profile.name, self.name);
        merge(&mut profile.surname, self.surname);
        merge(&mut profile.email, self.email);
        merge(&mut profile.phone_country_code, self.phone_country_code);
        merge(&mut profile.phone_prefix, self.phone_prefix);
        merge(&mut profile.phone_number, self.phone_number);
        merge(&mut profile.id_type, self.id_type);
        merge(&mut profile.document_number, self.document_number);
        merge(&mut profile.gender, self.gender);
        if self.avatar_url.is_some() {
            profile.avatar_url = self.avatar_url;
        }
    }

    /// Set all three phone parts at once.
    #[must_use]
    pub fn with_phone(mut self, phone: PhoneNumber) -> Self {
        self.phone_country_code = Some(phone.country_code);
        self.phone_prefix = Some(phone.prefix);
        self.phone_number = Some(phone.number);
        self
    }
}

impl From<UserProfile> for ProfileUpdate {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: Some(profile.id),
            name: Some(profile.name),
            surname: Some(profile.surname),
            email: Some(profile.email),
            phone_country_code: Some(profile.phone_country_code),
            phone_prefix: Some(profile.phone_prefix),
            phone_number: Some(profile.phone_number),
            id_type: Some(profile.id_type),
            document_number: Some(profile.document_number),
            gender: Some(profile.gender),
            avatar_url: profile.avatar_url,
        }
    }
}

/// A saved delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    /// Short label such as "Casa" or "Trabajo".
    #[serde(alias = "name")]
    pub label: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub is_default: bool,
}

/// A new address before the store assigns its ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDraft {
    pub label: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    /// Request default status; the first address is default regardless.
    pub is_default: bool,
}

impl AddressDraft {
    pub(crate) fn into_address(self, id: AddressId, is_default: bool) -> Address {
        Address {
            id,
            label: self.label,
            street: self.street,
            city: self.city,
            state: self.state,
            zip_code: self.zip_code,
            is_default,
        }
    }
}

/// A partial address; `Some` fields overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressUpdate {
    pub label: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressUpdate {
    /// Update that only makes the address the default.
    #[must_use]
    pub fn make_default() -> Self {
        Self {
            is_default: Some(true),
            ..Self::default()
        }
    }

    pub(crate) fn apply_to(self, address: &mut Address) {
        if let Some(label) = self.label {
            address.label = label;
        }
        if let Some(street) = self.street {
            address.street = street;
        }
        if let Some(city) = self.city {
            address.city = city;
        }
        if let Some(state) = self.state {
            address.state = state;
        }
        if let Some(zip_code) = self.zip_code {
            address.zip_code = zip_code;
        }
    }
}

/// One line of a past order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItem {
    pub id: String,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: String,
}

/// A past order. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: PurchaseId,
    pub date: NaiveDate,
    pub total: Price,
    pub status: PurchaseStatus,
    pub order_number: String,
    pub items: Vec<PurchaseItem>,
}

impl Purchase {
    /// Number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// A product the customer saved for later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteItem {
    pub id: FavoriteId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: String,
    pub in_stock: bool,
}

/// A new favorite before the store assigns its ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteDraft {
    pub name: String,
    pub price: Price,
    pub image_url: String,
    pub in_stock: bool,
}

impl From<&crate::catalog::Product> for FavoriteDraft {
    fn from(product: &crate::catalog::Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            in_stock: product.in_stock,
        }
    }
}
