use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::catalog::catalog;
use crate::constants::constants;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuoteError {
  #[error("missing required field: {0}")]
  MissingField(&'static str),
  #[error("invalid phone number: {0}")]
  InvalidPhone(String),
  #[error("invalid email address: {0}")]
  InvalidEmail(String),
  #[error("select at least one special effect")]
  NoEffects,
  #[error("unknown effect {0:?}")]
  UnknownEffect(String),
  #[error("unknown event type {0:?}")]
  UnknownEventType(String),
}

// --- Validation ---

/// Colombian phone numbers: optional `+57`/`57` prefix, then 10 or 7 digits.
/// Whitespace is ignored.
pub fn validate_phone(phone: &str) -> bool {
  let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
  let local_len_ok = |digits: &str| digits.chars().all(|c| c.is_ascii_digit()) && matches!(digits.len(), 7 | 10);

  if let Some(rest) = compact.strip_prefix('+') {
    return rest.strip_prefix("57").is_some_and(local_len_ok);
  }
  local_len_ok(&compact) || compact.strip_prefix("57").is_some_and(local_len_ok)
}

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn validate_email(email: &str) -> bool {
  let Some((local, domain)) = email.split_once('@') else { return false };
  let clean = |s: &str| !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '@');
  if !clean(local) || !clean(domain) {
    return false;
  }
  domain.char_indices().any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

const MONTHS_ES: [&str; 12] = [
  "enero",
  "febrero",
  "marzo",
  "abril",
  "mayo",
  "junio",
  "julio",
  "agosto",
  "septiembre",
  "octubre",
  "noviembre",
  "diciembre",
];

/// Long Spanish date, e.g. `23 de noviembre de 2025`.
pub fn format_date_es(date: NaiveDate) -> String {
  format!("{} de {} de {}", date.day(), MONTHS_ES[date.month0() as usize], date.year())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, QuoteError> {
  let trimmed = value.trim();
  if trimmed.is_empty() { Err(QuoteError::MissingField(field)) } else { Ok(trimmed) }
}

/// Match `input` against a catalog list case-insensitively, returning the
/// catalog spelling.
fn canonical<'a>(options: &'a [String], input: &str) -> Option<&'a str> {
  let needle = input.trim().to_lowercase();
  options.iter().find(|o| o.to_lowercase() == needle).map(String::as_str)
}

// --- Requests ---

#[derive(Debug, Clone, Default)]
pub struct QuoteRequest {
  pub name: String,
  pub phone: String,
  pub email: Option<String>,
  pub city: Option<String>,
  pub event_type: String,
  pub event_date: Option<NaiveDate>,
  pub event_time: Option<String>,
  pub location: Option<String>,
  pub guests: Option<String>,
  pub comments: Option<String>,
  pub effects: Vec<String>,
}

impl QuoteRequest {
  /// Check required fields and normalize event type / effects to catalog
  /// spelling. Effects keep selection order; duplicates are dropped.
  pub fn validate(mut self) -> Result<Self, QuoteError> {
    require(&self.name, "name")?;
    require(&self.phone, "phone")?;
    require(&self.event_type, "event type")?;
    if self.event_date.is_none() {
      return Err(QuoteError::MissingField("event date"));
    }
    if !validate_phone(&self.phone) {
      return Err(QuoteError::InvalidPhone(self.phone));
    }
    if let Some(email) = non_empty(&self.email)
      && !validate_email(email)
    {
      return Err(QuoteError::InvalidEmail(email.to_string()));
    }

    let c = catalog();
    self.event_type = canonical(&c.event_types, &self.event_type)
      .ok_or_else(|| QuoteError::UnknownEventType(self.event_type.clone()))?
      .to_string();

    if self.effects.iter().all(|e| e.trim().is_empty()) {
      return Err(QuoteError::NoEffects);
    }
    let mut effects: Vec<String> = Vec::new();
    for effect in self.effects.iter().filter(|e| !e.trim().is_empty()) {
      let name = canonical(&c.effects, effect).ok_or_else(|| QuoteError::UnknownEffect(effect.clone()))?;
      if !effects.iter().any(|e| e == name) {
        effects.push(name.to_string());
      }
    }
    self.effects = effects;
    Ok(self)
  }

  /// Chat message body. Call on a validated request.
  pub fn message(&self) -> String {
    let mut msg = format!("🎉 *COTIZACIÓN DE EVENTO - {}* 🎉\n\n", constants().business_name.to_uppercase());

    msg.push_str("👤 *DATOS DE CONTACTO*\n");
    msg.push_str(&format!("Nombre: {}\n", self.name.trim()));
    msg.push_str(&format!("Teléfono: {}\n", self.phone.trim()));
    if let Some(email) = non_empty(&self.email) {
      msg.push_str(&format!("Email: {}\n", email));
    }
    if let Some(city) = non_empty(&self.city) {
      msg.push_str(&format!("Ciudad: {}\n", city));
    }

    msg.push_str("\n📅 *DETALLES DEL EVENTO*\n");
    msg.push_str(&format!("Tipo de Evento: {}\n", self.event_type));
    if let Some(date) = self.event_date {
      msg.push_str(&format!("Fecha: {}\n", format_date_es(date)));
    }
    if let Some(time) = non_empty(&self.event_time) {
      msg.push_str(&format!("Hora: {}\n", time));
    }
    if let Some(location) = non_empty(&self.location) {
      msg.push_str(&format!("Ubicación: {}\n", location));
    }
    if let Some(guests) = non_empty(&self.guests) {
      msg.push_str(&format!("Número de Invitados: {}\n", guests));
    }

    msg.push_str("\n✨ *EFECTOS ESPECIALES SOLICITADOS*\n");
    for (i, effect) in self.effects.iter().enumerate() {
      msg.push_str(&format!("{}. {}\n", i + 1, effect));
    }

    if let Some(comments) = non_empty(&self.comments) {
      msg.push_str(&format!("\n💬 *COMENTARIOS ADICIONALES*\n{}\n", comments));
    }

    msg.push_str("\n---\n¡Espero su cotización! 🙏");
    msg
  }
}

/// Short "call me back" request.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryRequest {
  pub name: String,
  pub phone: String,
}

impl AdvisoryRequest {
  pub fn validate(self) -> Result<Self, QuoteError> {
    require(&self.name, "name")?;
    require(&self.phone, "phone")?;
    if !validate_phone(&self.phone) {
      return Err(QuoteError::InvalidPhone(self.phone));
    }
    Ok(self)
  }

  pub fn message(&self) -> String {
    format!(
      "🎯 *SOLICITUD DE ASESORÍA - {business}*\n\n\
       Hola, me gustaría recibir asesoría profesional sobre los efectos especiales para mi evento.\n\n\
       👤 *MIS DATOS*\n\
       Nombre: {name}\n\
       Teléfono: {phone}\n\n\
       Quedo atento a su orientación para elegir los mejores efectos según mis necesidades.\n\n\
       ¡Gracias! 🙏",
      business = constants().business_name.to_uppercase(),
      name = self.name.trim(),
      phone = self.phone.trim(),
    )
  }
}

/// `wa.me` deep-link carrying `message` as pre-filled text.
pub fn whatsapp_url(number: &str, message: &str) -> String {
  format!("https://wa.me/{}?text={}", number, urlencoding::encode(message))
}
