// src/cart_utils.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Cafe, CafeRef, Cart, Drink, ProductSnapshot, UnitSelection};

/// Napój i kawiarnia przypisane do jednej sztuki produktu.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrinkAssignment {
    pub drink: Drink,
    pub cafe: CafeRef,
}

/// Przypisania w obrębie jednej sesji kreatora: `unit_id` -> napój + kawiarnia.
pub type DrinkSelectionMap = HashMap<String, DrinkAssignment>;

/// Jedna sztuka produktu z koszyka, do której osobno wybiera się napój.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedCartUnit {
    pub unit_id: String,
    pub product_id: String,
    pub product: ProductSnapshot,
    pub assigned_drink: Option<Drink>,
    pub assigned_cafe: Option<CafeRef>,
}

impl ExpandedCartUnit {
    pub fn is_complete(&self) -> bool {
        self.assigned_drink.is_some() && self.assigned_cafe.is_some()
    }
}

pub fn unit_id_for(product_id: &str, ordinal: u32) -> String {
    format!("{}-{}", product_id, ordinal)
}

/// Rozwija koszyk na pojedyncze sztuki.
///
/// Iterator jest leniwy i skończony; żeby zacząć od nowa wystarczy wywołać
/// funkcję jeszcze raz (albo sklonować iterator). Numeracja sztuk jest liczona
/// per produkt w całym koszyku, więc identyfikatory pozostają unikalne nawet
/// wtedy, gdy ten sam produkt pojawi się w dwóch pozycjach.
pub fn expand_cart(cart: &Cart) -> impl Iterator<Item = ExpandedCartUnit> + Clone + '_ {
    cart.items.iter().enumerate().flat_map(move |(line_idx, line)| {
        let offset: u32 = cart.items[..line_idx]
            .iter()
            .filter(|earlier| earlier.product_id == line.product_id)
            .map(|earlier| earlier.quantity)
            .sum();

        (0..line.quantity).map(move |ordinal| ExpandedCartUnit {
            unit_id: unit_id_for(&line.product_id, offset + ordinal),
            product_id: line.product_id.clone(),
            product: line.product.clone(),
            assigned_drink: None,
            assigned_cafe: None,
        })
    })
}

/// Zapamiętane rozwinięcie koszyka. Przelicza się tylko wtedy, gdy zmieni
/// się sama referencja do koszyka.
#[derive(Debug, Clone)]
pub struct CartExpansion {
    cart: Arc<Cart>,
    units: Vec<ExpandedCartUnit>,
}

impl CartExpansion {
    pub fn new(cart: Arc<Cart>) -> Self {
        let units = expand_cart(&cart).collect();
        CartExpansion { cart, units }
    }

    pub fn cart(&self) -> &Arc<Cart> {
        &self.cart
    }

    pub fn units(&self) -> &[ExpandedCartUnit] {
        &self.units
    }

    /// Podmienia koszyk. Zwraca `true`, jeśli rozwinięcie zostało przeliczone.
    pub fn refresh(&mut self, cart: Arc<Cart>) -> bool {
        if Arc::ptr_eq(&self.cart, &cart) {
            return false;
        }
        tracing::debug!(
            "Przeliczanie rozwinięcia koszyka {} ({} sztuk)",
            cart.cart_id,
            cart.total_units()
        );
        self.units = expand_cart(&cart).collect();
        self.cart = cart;
        true
    }

    pub fn contains(&self, unit_id: &str) -> bool {
        self.units.iter().any(|unit| unit.unit_id == unit_id)
    }

    /// Sztuki z naniesionymi przypisaniami z mapy wyborów.
    pub fn with_selections(&self, selections: &DrinkSelectionMap) -> Vec<ExpandedCartUnit> {
        self.units
            .iter()
            .map(|unit| {
                let mut unit = unit.clone();
                if let Some(assignment) = selections.get(&unit.unit_id) {
                    unit.assigned_drink = Some(assignment.drink.clone());
                    unit.assigned_cafe = Some(assignment.cafe.clone());
                }
                unit
            })
            .collect()
    }

    /// Usuwa wybory dla sztuk, których nie ma już w koszyku.
    pub fn prune_selections(&self, selections: &mut DrinkSelectionMap) -> usize {
        let before = selections.len();
        selections.retain(|unit_id, _| self.contains(unit_id));
        before - selections.len()
    }
}

/// Czy każda sztuka ma przypisany napój i kawiarnię.
pub fn all_assigned(units: &[ExpandedCartUnit], selections: &DrinkSelectionMap) -> bool {
    units.iter().all(|unit| selections.contains_key(&unit.unit_id))
}

/// Identyfikatory sztuk, którym wciąż brakuje wyboru.
pub fn unassigned_units<'a>(
    units: &'a [ExpandedCartUnit],
    selections: &DrinkSelectionMap,
) -> Vec<&'a str> {
    units
        .iter()
        .filter(|unit| !selections.contains_key(&unit.unit_id))
        .map(|unit| unit.unit_id.as_str())
        .collect()
}

/// Buduje przypisanie po sprawdzeniu, że napój jest w menu wybranej kawiarni.
pub fn resolve_assignment(
    cafes: &[Cafe],
    cafe_id: &str,
    drink_id: &str,
) -> Result<DrinkAssignment, AppError> {
    let cafe = cafes.iter().find(|cafe| cafe.id == cafe_id).ok_or_else(|| {
        tracing::warn!("Nie znaleziono kawiarni o ID: {}", cafe_id);
        AppError::NotFound
    })?;

    let drink = cafe.find_drink(drink_id).ok_or_else(|| {
        tracing::warn!(
            "Napój {} nie występuje w menu kawiarni {}",
            drink_id,
            cafe.id
        );
        AppError::UnprocessableEntity(format!(
            "Wybrany napój nie jest dostępny w kawiarni {}.",
            cafe.name
        ))
    })?;

    Ok(DrinkAssignment {
        drink: drink.clone(),
        cafe: CafeRef::from(cafe),
    })
}

/// Lista wyborów w kolejności sztuk, do payloadu zamówienia.
pub fn selections_in_unit_order(
    units: &[ExpandedCartUnit],
    selections: &DrinkSelectionMap,
) -> Vec<UnitSelection> {
    units
        .iter()
        .filter_map(|unit| {
            selections.get(&unit.unit_id).map(|assignment| UnitSelection {
                unit_id: unit.unit_id.clone(),
                product_id: unit.product_id.clone(),
                drink_id: assignment.drink.id.clone(),
                cafe_id: assignment.cafe.id.clone(),
            })
        })
        .collect()
}
