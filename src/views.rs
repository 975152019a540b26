// src/views.rs
// Fragmenty HTML (maud) dla frontu HTMX. Wszystko inne idzie jako JSON.

use maud::{Markup, html};
use strum::IntoEnumIterator;

use crate::cart_utils::ExpandedCartUnit;
use crate::models::{DeliveryMethod, PaymentMethod};
use crate::wizard::{DeliveryStatus, PICKUP_ADDRESS, WizardStep, WizardView};

pub fn format_price_maud(price: i64) -> String {
    format!("{:.2}", (price as f64) / 100.0) + " EGP"
}

fn step_label(step: WizardStep) -> &'static str {
    match step {
        WizardStep::SelectDrinks => "Napoje",
        WizardStep::ConfirmInfo => "Dane",
        WizardStep::Review => "Podsumowanie",
        WizardStep::DeliveryInProgress => "Dostawa",
        WizardStep::ThankYou => "Gotowe",
    }
}

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "Gotówka przy odbiorze",
        PaymentMethod::Card => "Karta",
    }
}

pub fn render_progress(current: WizardStep) -> Markup {
    html! {
        ol ."flex gap-2 text-sm" {
            @for step in WizardStep::iter() {
                @let class = if step == current {
                    "font-semibold text-pink-600"
                } else if step.index() < current.index() {
                    "text-gray-700"
                } else {
                    "text-gray-400"
                };
                li class=(class) data-step=(step.index()) { (step_label(step)) }
            }
        }
    }
}

fn render_unit_row(unit: &ExpandedCartUnit, active_unit: Option<&str>) -> Markup {
    let is_active = active_unit == Some(unit.unit_id.as_str());
    html! {
        tr id={"unit-" (unit.unit_id)}
            ."bg-pink-50"[is_active]
            data-complete=(unit.is_complete()) {
            td { (unit.product.name) }
            td { (format_price_maud(unit.product.price)) }
            td {
                @match (&unit.assigned_drink, &unit.assigned_cafe) {
                    (Some(drink), Some(cafe)) => {
                        span ."text-green-700" { "✓ " (drink.name) " (" (cafe.name) ")" }
                    }
                    _ => {
                        span ."text-red-600" { "Wybierz napój" }
                    }
                }
            }
        }
    }
}

pub fn render_units_table(view: &WizardView) -> Markup {
    html! {
        table ."w-full text-left" {
            thead {
                tr {
                    th { "Produkt" }
                    th { "Cena" }
                    th { "Napój" }
                }
            }
            tbody {
                @for unit in &view.units {
                    (render_unit_row(unit, view.active_unit.as_deref()))
                }
            }
        }
        @if !view.all_assigned {
            p ."text-sm text-red-600 mt-2" {
                "Brakuje napoju dla " (view.missing_units.len()) " szt."
            }
        }
    }
}

pub fn render_review(view: &WizardView) -> Markup {
    let customer = &view.customer;
    let address_parts = [&customer.street, &customer.city, &customer.country]
        .into_iter()
        .flatten();
    html! {
        div #wizard-review ."space-y-4" {
            (render_progress(view.step))
            section {
                h3 ."font-semibold" { "Zamówienie" }
                (render_units_table(view))
                p ."mt-2 font-semibold" { "Razem: " (format_price_maud(view.total_price)) }
            }
            section {
                h3 ."font-semibold" { "Dane klienta" }
                p { (customer.name) }
                p { (customer.email) }
                p { (customer.phone) }
                @match customer.delivery_method {
                    DeliveryMethod::Delivery => {
                        p {
                            @for part in address_parts {
                                (part) " "
                            }
                        }
                    }
                    DeliveryMethod::Pickup => {
                        p { (PICKUP_ADDRESS) }
                    }
                }
                p { "Płatność: " (payment_label(view.payment_method)) }
            }
            @if !view.field_errors.is_empty() {
                ul ."text-sm text-red-600" {
                    @for (field, message) in &view.field_errors {
                        li data-field=(field) { (message) }
                    }
                }
            }
        }
    }
}

pub fn render_delivery(view: &WizardView) -> Markup {
    html! {
        div #wizard-delivery
            hx-get={"/api/wizard/" (view.id) "/review"}
            hx-trigger="every 2s"
            hx-swap="outerHTML" {
            (render_progress(view.step))
            @match &view.delivery {
                DeliveryStatus::Failed { message } => {
                    p ."text-red-600" { (message) }
                    button hx-post={"/api/wizard/" (view.id) "/delivery/retry"} {
                        "Spróbuj ponownie"
                    }
                }
                _ => {
                    p { "Przygotowujemy Twoje zamówienie..." }
                }
            }
        }
    }
}

pub fn render_thank_you(view: &WizardView) -> Markup {
    let order_id = view
        .confirmation
        .as_ref()
        .and_then(|c| c.order_id.as_deref());
    let cart_left_over = view.delivery == DeliveryStatus::Finished {
        cart_cleared: false,
    };
    html! {
        div #wizard-thank-you ."text-center space-y-2" {
            (render_progress(view.step))
            h2 ."text-xl font-semibold" { "Dziękujemy za zamówienie!" }
            @if let Some(order_id) = order_id {
                p { "Numer zamówienia: " strong { (order_id) } }
            }
            @if cart_left_over {
                p ."text-sm text-gray-500" { "Koszyk może jeszcze zawierać zamówione produkty." }
            }
        }
    }
}

/// Fragment odpowiedni dla aktualnego kroku kreatora.
pub fn render_wizard(view: &WizardView) -> Markup {
    match view.step {
        WizardStep::SelectDrinks | WizardStep::ConfirmInfo => html! {
            div #wizard-units {
                (render_progress(view.step))
                (render_units_table(view))
            }
        },
        WizardStep::Review => render_review(view),
        WizardStep::DeliveryInProgress => render_delivery(view),
        WizardStep::ThankYou => render_thank_you(view),
    }
}
