// src/auth_models.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::models::Role;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginPayload {
    #[validate(email(message = "Niepoprawny format adresu email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Hasło jest wymagane"))]
    pub password: String,
}

/// Odpowiedź API sklepu na poprawne logowanie.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

/// Token sesji wraz z rolą. W nagłówku wysyłany jako `User <token>` lub `Admin <token>`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub role: Role,
    pub token: String,
}

impl AuthToken {
    pub fn new(role: Role, token: impl Into<String>) -> Self {
        AuthToken {
            role,
            token: token.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn header_value(&self) -> String {
        let scheme = match self.role {
            Role::User => "User",
            Role::Admin => "Admin",
        };
        format!("{} {}", scheme, self.token)
    }
}

// Nie wypisujemy tokenu do logów
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("role", &self.role)
            .field("token", &"***")
            .finish()
    }
}

impl FromStr for AuthToken {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (scheme, token) = value
            .trim()
            .split_once(' ')
            .ok_or_else(|| "Brak schematu w nagłówku Authorization".to_string())?;
        let token = token.trim();
        if token.is_empty() {
            return Err("Pusty token w nagłówku Authorization".to_string());
        }
        let role = Role::from_str(scheme)
            .map_err(|_| format!("Nieobsługiwany schemat autoryzacji: {}", scheme))?;
        Ok(AuthToken::new(role, token))
    }
}
