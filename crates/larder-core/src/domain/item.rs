//! PantryItem domain entity
//!
//! This module defines the PantryItem entity which represents one pantry
//! ingredient tracked by Larder, together with the soft-delete ("trash")
//! lifecycle governing its visibility in the active cache.
//!
//! ## Lifecycle
//!
//! ```text
//!     ┌──────────┐    trash     ┌───────────┐  hard delete
//!     │  Active  │ ───────────► │  Trashed  │ ────────────►  (gone)
//!     │ (cached) │              │(uncached) │
//!     └──────────┘              └───────────┘
//!          ▲                         │
//!          │        restore          │
//!          └─────────────────────────┘
//! ```
//!
//! `trashed_at` is set if and only if the item is in the trash; the pair is
//! only ever written through [`PantryItem::trash`] and [`PantryItem::restore`]
//! so the two cannot drift apart.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DomainError;
use super::newtypes::{ItemId, UserId};

// ============================================================================
// TrashState enum
// ============================================================================

/// Soft-delete state of a pantry item
///
/// Active items are members of the in-memory cache; trashed items are
/// excluded from it and only reachable through the on-demand trash query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashState {
    /// Visible in the primary cache
    #[default]
    Active,
    /// Soft-deleted, excluded from the cache, restorable
    Trashed,
}

impl TrashState {
    /// Returns true if the item is visible in the active set
    pub fn is_active(&self) -> bool {
        matches!(self, TrashState::Active)
    }

    /// Returns true if the item is soft-deleted
    pub fn is_trashed(&self) -> bool {
        matches!(self, TrashState::Trashed)
    }

    /// Returns the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            TrashState::Active => "Active",
            TrashState::Trashed => "Trashed",
        }
    }
}

impl fmt::Display for TrashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrashState::Active => write!(f, "active"),
            TrashState::Trashed => write!(f, "trashed"),
        }
    }
}

// ============================================================================
// ExpiryStatus enum
// ============================================================================

/// Derived freshness classification of an item with an expiration date
///
/// Computed on demand, never stored. Items without an expiration date
/// have no expiry status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    /// Expiration lies beyond the warning window
    Fresh,
    /// Expiration falls within the warning window (today counts)
    ExpiringSoon,
    /// Expiration date has passed
    Expired,
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryStatus::Fresh => write!(f, "fresh"),
            ExpiryStatus::ExpiringSoon => write!(f, "expiring soon"),
            ExpiryStatus::Expired => write!(f, "expired"),
        }
    }
}

// ============================================================================
// NutritionFacts struct
// ============================================================================

/// Nutrition snapshot captured by the barcode/nutrition lookup collaborator
///
/// This is stored verbatim on the item as a point-in-time snapshot; Larder
/// never refreshes or recomputes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    /// Energy per serving, kcal
    pub calories: Option<f64>,
    /// Protein per serving, grams
    pub protein_g: Option<f64>,
    /// Carbohydrates per serving, grams
    pub carbs_g: Option<f64>,
    /// Fat per serving, grams
    pub fat_g: Option<f64>,
    /// Serving description as printed, e.g. "1 cup (240ml)"
    pub serving: Option<String>,
}

// ============================================================================
// ItemDraft struct
// ============================================================================

/// Caller-supplied input for creating a new pantry item
///
/// Drafts carry no identity and no lifecycle flags; the coordinator mints a
/// provisional id and the remote store assigns the final one. Validation is
/// explicit via [`ItemDraft::validate`] so the UI can check a form without
/// constructing an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    /// Display name, e.g. "Milk"
    pub name: String,
    /// Amount on hand; must be strictly positive for a new item
    pub quantity: f64,
    /// Unit of measure, free-form, e.g. "gallon"
    pub unit: String,
    /// Grouping category, e.g. "Dairy"
    pub category: Option<String>,
    /// Best-before date, if known
    pub expiration_date: Option<NaiveDate>,
    /// Free-form user notes
    pub notes: Option<String>,
    /// Brand name from barcode lookup
    pub brand: Option<String>,
    /// Scanned barcode value
    pub barcode: Option<String>,
    /// Nutrition snapshot from barcode lookup
    pub nutrition: Option<NutritionFacts>,
}

impl ItemDraft {
    /// Creates a draft with the required fields; optional fields start empty
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
            category: None,
            expiration_date: None,
            notes: None,
            brand: None,
            barcode: None,
            nutrition: None,
        }
    }

    /// Sets the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the expiration date
    pub fn with_expiration_date(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// Sets the notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Validates the draft for item creation
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyName` if the name is blank after trimming,
    /// `DomainError::NonFiniteQuantity` for NaN or infinite quantities, and
    /// `DomainError::NonPositiveQuantity` for quantities of zero or less.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        if !self.quantity.is_finite() {
            return Err(DomainError::NonFiniteQuantity);
        }
        if self.quantity <= 0.0 {
            return Err(DomainError::NonPositiveQuantity(self.quantity));
        }
        Ok(())
    }
}

// ============================================================================
// PantryItem struct
// ============================================================================

/// One pantry ingredient owned by a single user
///
/// PantryItem is the core domain entity. It mirrors the document shape held
/// by the remote store: attribute fields, audit timestamps, and the trash
/// flag pair. All fields are private; lifecycle flags change only through
/// the guarded transition methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryItem {
    /// Store-assigned identifier (provisional until the first persist)
    id: ItemId,
    /// Owning user; never changes after creation
    owner_id: UserId,
    /// Display name
    name: String,
    /// Amount on hand; never negative
    quantity: f64,
    /// Unit of measure
    unit: String,
    /// Grouping category
    category: Option<String>,
    /// Best-before date
    expiration_date: Option<NaiveDate>,
    /// Free-form user notes
    notes: Option<String>,
    /// Brand name from barcode lookup
    brand: Option<String>,
    /// Scanned barcode value
    barcode: Option<String>,
    /// Nutrition snapshot from barcode lookup
    nutrition: Option<NutritionFacts>,
    /// Soft-delete flag
    in_trash: bool,
    /// When the item entered the trash; `Some` iff `in_trash`
    trashed_at: Option<DateTime<Utc>>,
    /// When the item was created
    created_at: DateTime<Utc>,
    /// Last modification stamp; the last-writer-wins tie-breaker
    updated_at: DateTime<Utc>,
}

impl PantryItem {
    /// Creates a new active PantryItem with validation
    ///
    /// # Arguments
    ///
    /// * `id` - Item identifier (provisional or store-assigned)
    /// * `owner_id` - The owning user
    /// * `name` - Display name (must not be blank)
    /// * `quantity` - Amount on hand (must be finite and non-negative)
    /// * `unit` - Unit of measure
    /// * `now` - Timestamp for `created_at` and `updated_at`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyName`, `DomainError::NonFiniteQuantity`
    /// or `DomainError::NegativeQuantity` on invalid input.
    pub fn new(
        id: ItemId,
        owner_id: UserId,
        name: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        if !quantity.is_finite() {
            return Err(DomainError::NonFiniteQuantity);
        }
        if quantity < 0.0 {
            return Err(DomainError::NegativeQuantity(quantity));
        }

        Ok(Self {
            id,
            owner_id,
            name: name.trim().to_string(),
            quantity,
            unit: unit.into(),
            category: None,
            expiration_date: None,
            notes: None,
            brand: None,
            barcode: None,
            nutrition: None,
            in_trash: false,
            trashed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Creates a PantryItem from a validated draft
    ///
    /// The draft's own validation applies, so a zero quantity is rejected
    /// here even though the entity itself permits it (an existing item may
    /// legitimately run out).
    ///
    /// # Errors
    ///
    /// Returns the draft's validation error unchanged.
    pub fn from_draft(
        draft: ItemDraft,
        id: ItemId,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        draft.validate()?;

        let mut item = Self::new(id, owner_id, draft.name, draft.quantity, draft.unit, now)?;
        item.category = draft.category;
        item.expiration_date = draft.expiration_date;
        item.notes = draft.notes;
        item.brand = draft.brand;
        item.barcode = draft.barcode;
        item.nutrition = draft.nutrition;
        Ok(item)
    }

    // --- Getters ---

    /// Returns the item's identifier
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// Returns the owning user's identifier
    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    /// Returns the display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the amount on hand
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Returns the unit of measure
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Returns the category, if set
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Returns the expiration date, if set
    pub fn expiration_date(&self) -> Option<NaiveDate> {
        self.expiration_date
    }

    /// Returns the notes, if set
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Returns the brand, if set
    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    /// Returns the barcode, if set
    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref()
    }

    /// Returns the nutrition snapshot, if set
    pub fn nutrition(&self) -> Option<&NutritionFacts> {
        self.nutrition.as_ref()
    }

    /// Returns true if the item is in the trash
    pub fn in_trash(&self) -> bool {
        self.in_trash
    }

    /// Returns when the item entered the trash
    pub fn trashed_at(&self) -> Option<DateTime<Utc>> {
        self.trashed_at
    }

    /// Returns the creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last modification timestamp
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // --- Setters ---

    /// Renames the item and stamps `updated_at`
    ///
    /// # Errors
    /// Returns `DomainError::EmptyName` if the new name is blank.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        self.name = name.trim().to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Changes the quantity and stamps `updated_at`
    ///
    /// Zero is allowed (the ingredient ran out); negatives are not.
    ///
    /// # Errors
    /// Returns `DomainError::NegativeQuantity` or `DomainError::NonFiniteQuantity`.
    pub fn set_quantity(&mut self, quantity: f64) -> Result<(), DomainError> {
        if !quantity.is_finite() {
            return Err(DomainError::NonFiniteQuantity);
        }
        if quantity < 0.0 {
            return Err(DomainError::NegativeQuantity(quantity));
        }
        self.quantity = quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Changes the unit of measure and stamps `updated_at`
    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
        self.updated_at = Utc::now();
    }

    /// Changes the category and stamps `updated_at`
    pub fn set_category(&mut self, category: Option<String>) {
        self.category = category;
        self.updated_at = Utc::now();
    }

    /// Changes the expiration date and stamps `updated_at`
    pub fn set_expiration_date(&mut self, date: Option<NaiveDate>) {
        self.expiration_date = date;
        self.updated_at = Utc::now();
    }

    /// Changes the notes and stamps `updated_at`
    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
        self.updated_at = Utc::now();
    }

    /// Changes the brand and stamps `updated_at`
    pub fn set_brand(&mut self, brand: Option<String>) {
        self.brand = brand;
        self.updated_at = Utc::now();
    }

    /// Changes the barcode and stamps `updated_at`
    pub fn set_barcode(&mut self, barcode: Option<String>) {
        self.barcode = barcode;
        self.updated_at = Utc::now();
    }

    /// Replaces the nutrition snapshot and stamps `updated_at`
    pub fn set_nutrition(&mut self, nutrition: Option<NutritionFacts>) {
        self.nutrition = nutrition;
        self.updated_at = Utc::now();
    }

    /// Overrides `updated_at` with a store-provided stamp
    ///
    /// Adapters use this to echo server timestamps; the stamp is the
    /// last-writer-wins tie-breaker, so it must reflect what the store
    /// recorded, not when the client noticed.
    pub fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    /// Overrides `created_at` with a store-provided stamp
    pub fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
}

// ============================================================================
// Trash lifecycle transitions
// ============================================================================

impl PantryItem {
    /// Returns the current lifecycle state
    pub fn trash_state(&self) -> TrashState {
        if self.in_trash {
            TrashState::Trashed
        } else {
            TrashState::Active
        }
    }

    /// Checks if a lifecycle transition is valid
    ///
    /// Valid transitions:
    /// - Active -> Trashed (trash)
    /// - Trashed -> Active (restore)
    ///
    /// Hard deletion is not a state; it removes the record entirely and is
    /// handled at the store level.
    pub fn can_transition_to(&self, target: TrashState) -> bool {
        self.trash_state() != target
    }

    /// Moves the item into the trash
    ///
    /// Stamps `trashed_at` and `updated_at` with `at`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the item is already
    /// trashed.
    pub fn trash(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.can_transition_to(TrashState::Trashed) {
            return Err(DomainError::InvalidTransition {
                from: self.trash_state().name().to_string(),
                to: TrashState::Trashed.name().to_string(),
            });
        }

        self.in_trash = true;
        self.trashed_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Restores the item from the trash
    ///
    /// Clears `trashed_at` and stamps `updated_at` with `at`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the item is already
    /// active.
    pub fn restore(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.can_transition_to(TrashState::Active) {
            return Err(DomainError::InvalidTransition {
                from: self.trash_state().name().to_string(),
                to: TrashState::Active.name().to_string(),
            });
        }

        self.in_trash = false;
        self.trashed_at = None;
        self.updated_at = at;
        Ok(())
    }
}

// ============================================================================
// Derived expiration status
// ============================================================================

impl PantryItem {
    /// Days until the expiration date, negative once past
    ///
    /// Returns `None` for items without an expiration date.
    pub fn days_until_expiration(&self, today: NaiveDate) -> Option<i64> {
        self.expiration_date
            .map(|date| (date - today).num_days())
    }

    /// Classifies freshness relative to `today`
    ///
    /// `soon_window_days` is the warning horizon: an item expiring today
    /// through `today + soon_window_days` counts as expiring soon.
    pub fn expiry_status(&self, today: NaiveDate, soon_window_days: i64) -> Option<ExpiryStatus> {
        let days = self.days_until_expiration(today)?;
        let status = if days < 0 {
            ExpiryStatus::Expired
        } else if days <= soon_window_days {
            ExpiryStatus::ExpiringSoon
        } else {
            ExpiryStatus::Fresh
        };
        Some(status)
    }

    /// Returns true if the expiration date has passed
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        matches!(self.days_until_expiration(today), Some(days) if days < 0)
    }

    /// Returns true if the item expires between today and `today + days`
    ///
    /// Already-expired items do not count; they are `is_expired`, not
    /// expiring.
    pub fn is_expiring_within(&self, today: NaiveDate, days: i64) -> bool {
        matches!(self.days_until_expiration(today), Some(d) if (0..=days).contains(&d))
    }

    /// One-line projection for external consumers: `name: quantity unit`
    ///
    /// Whole quantities print without a decimal part, e.g. `Milk: 1 gallon`
    /// rather than `Milk: 1.0 gallon`.
    pub fn summary_line(&self) -> String {
        format!("{}: {} {}", self.name, format_quantity(self.quantity), self.unit)
    }
}

/// Formats a quantity without a trailing `.0` on whole numbers
fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 && quantity.abs() < 1e15 {
        format!("{}", quantity as i64)
    } else {
        format!("{quantity}")
    }
}

// ============================================================================
// Tests
// ============================================================================
