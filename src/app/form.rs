use strum::{EnumIter, IntoEnumIterator};
use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::records::{Incident, IncidentDraft, IncidentStatus, Location};

const MAX_FIELD_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum FormField {
    IncidentNumber,
    Sigma,
    Kind,
    Date,
    Address,
    Description,
    Victim,
    Garrison,
    VehicleDetails,
    StolenDetails,
    Status,
}

impl FormField {
    pub fn label(self) -> &'static str {
        match self {
            FormField::IncidentNumber => "Incident number",
            FormField::Sigma => "SIGMA",
            FormField::Kind => "Nature",
            FormField::Date => "Date (YYYY-MM-DDTHH:MM)",
            FormField::Address => "Address",
            FormField::Description => "Description",
            FormField::Victim => "Victim",
            FormField::Garrison => "Garrison",
            FormField::VehicleDetails => "Vehicle",
            FormField::StolenDetails => "Stolen items",
            FormField::Status => "Status",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(
            self,
            FormField::IncidentNumber
                | FormField::Sigma
                | FormField::Kind
                | FormField::Date
                | FormField::Address
        )
    }
}

/// Text buffers behind the register/update form.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentForm {
    id: Option<String>,
    focus: FormField,
    incident_number: String,
    sigma: String,
    kind: String,
    date: String,
    address: String,
    coordinates: (Option<f64>, Option<f64>),
    description: String,
    victim: String,
    garrison: String,
    vehicle_details: String,
    stolen_details: String,
    pub status: IncidentStatus,
}

impl IncidentForm {
    pub fn blank() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: None,
            focus: FormField::IncidentNumber,
            incident_number: String::new(),
            sigma: String::new(),
            kind: String::new(),
            date: format!(
                "{}T{:02}:{:02}",
                crate::records::format_iso_date(now.date()),
                now.hour(),
                now.minute()
            ),
            address: String::new(),
            coordinates: (None, None),
            description: String::new(),
            victim: String::new(),
            garrison: String::new(),
            vehicle_details: String::new(),
            stolen_details: String::new(),
            status: IncidentStatus::Open,
        }
    }

    pub fn from_incident(incident: &Incident) -> Self {
        Self {
            id: Some(incident.id.clone()),
            focus: FormField::IncidentNumber,
            incident_number: incident.incident_number.clone(),
            sigma: incident.sigma.clone(),
            kind: incident.kind.clone(),
            date: incident.date.clone(),
            address: incident.location.address.clone(),
            coordinates: (incident.location.lat, incident.location.lng),
            description: incident.description.clone(),
            victim: incident.victim.clone().unwrap_or_default(),
            garrison: incident.garrison.clone().unwrap_or_default(),
            vehicle_details: incident.vehicle_details.clone().unwrap_or_default(),
            stolen_details: incident.stolen_details.clone().unwrap_or_default(),
            status: incident.status,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.id.is_some()
    }

    pub fn focus(&self) -> FormField {
        self.focus
    }

    pub fn focus_next(&mut self) {
        self.focus = self.step(1);
    }

    pub fn focus_previous(&mut self) {
        self.focus = self.step(-1);
    }

    fn step(&self, delta: isize) -> FormField {
        let fields: Vec<FormField> = FormField::iter().collect();
        let current = fields
            .iter()
            .position(|field| *field == self.focus)
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(fields.len() as isize) as usize;
        fields[next]
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::IncidentNumber => &self.incident_number,
            FormField::Sigma => &self.sigma,
            FormField::Kind => &self.kind,
            FormField::Date => &self.date,
            FormField::Address => &self.address,
            FormField::Description => &self.description,
            FormField::Victim => &self.victim,
            FormField::Garrison => &self.garrison,
            FormField::VehicleDetails => &self.vehicle_details,
            FormField::StolenDetails => &self.stolen_details,
            FormField::Status => match self.status {
                IncidentStatus::Open => "Aberto",
                IncidentStatus::Concluded => "Concluído",
            },
        }
    }

    fn buffer_mut(&mut self, field: FormField) -> Option<&mut String> {
        Some(match field {
            FormField::IncidentNumber => &mut self.incident_number,
            FormField::Sigma => &mut self.sigma,
            FormField::Kind => &mut self.kind,
            FormField::Date => &mut self.date,
            FormField::Address => &mut self.address,
            FormField::Description => &mut self.description,
            FormField::Victim => &mut self.victim,
            FormField::Garrison => &mut self.garrison,
            FormField::VehicleDetails => &mut self.vehicle_details,
            FormField::StolenDetails => &mut self.stolen_details,
            FormField::Status => return None,
        })
    }

    pub fn push_char(&mut self, ch: char) {
        if self.focus == FormField::Status {
            if ch == ' ' {
                self.status = self.status.toggled();
            }
            return;
        }
        if let Some(buffer) = self.buffer_mut(self.focus) {
            if buffer.len() < MAX_FIELD_LEN {
                buffer.push(ch);
            }
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(buffer) = self.buffer_mut(self.focus) {
            if let Some((idx, _)) = buffer.grapheme_indices(true).next_back() {
                buffer.truncate(idx);
            }
        }
    }

    /// First required field left blank, if any.
    pub fn missing_field(&self) -> Option<FormField> {
        FormField::iter()
            .filter(|field| field.is_required())
            .find(|field| self.value(*field).trim().is_empty())
    }

    /// Every buffer becomes part of the draft so that emptied optional fields clear on save.
    pub fn to_draft(&self) -> IncidentDraft {
        let text = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        let location = text(&self.address).map(|address| Location {
            address,
            lat: self.coordinates.0,
            lng: self.coordinates.1,
        });
        IncidentDraft {
            id: self.id.clone(),
            incident_number: text(&self.incident_number),
            sigma: text(&self.sigma),
            kind: text(&self.kind),
            description: Some(self.description.trim().to_string()),
            location,
            date: text(&self.date),
            status: Some(self.status),
            victim: Some(self.victim.trim().to_string()),
            garrison: Some(self.garrison.trim().to_string()),
            vehicle_details: Some(self.vehicle_details.trim().to_string()),
            stolen_details: Some(self.stolen_details.trim().to_string()),
            ..IncidentDraft::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::seed;

    #[test]
    fn focus_wraps_both_ways() {
        let mut form = IncidentForm::blank();
        form.focus_previous();
        assert_eq!(form.focus(), FormField::Status);
        form.focus_next();
        assert_eq!(form.focus(), FormField::IncidentNumber);
    }

    #[test]
    fn status_field_toggles_with_space_only() {
        let mut form = IncidentForm::blank();
        while form.focus() != FormField::Status {
            form.focus_next();
        }
        form.push_char('x');
        assert_eq!(form.status, IncidentStatus::Open);
        form.push_char(' ');
        assert_eq!(form.status, IncidentStatus::Concluded);
    }

    #[test]
    fn blank_form_reports_first_missing_field() {
        let mut form = IncidentForm::blank();
        assert_eq!(form.missing_field(), Some(FormField::IncidentNumber));
        for ch in "0042/2024".chars() {
            form.push_char(ch);
        }
        assert_eq!(form.missing_field(), Some(FormField::Sigma));
        let draft = form.to_draft();
        assert_eq!(draft.id, None);
        assert_eq!(draft.incident_number.as_deref(), Some("0042/2024"));
        assert_eq!(draft.sigma, None);
    }

    #[test]
    fn edit_form_keeps_id_and_coordinates() {
        let incident = seed::incidents().remove(0);
        let mut form = IncidentForm::from_incident(&incident);
        assert!(form.is_editing());
        assert_eq!(form.missing_field(), None);

        while form.focus() != FormField::Victim {
            form.focus_next();
        }
        for _ in 0..200 {
            form.pop_char();
        }
        let draft = form.to_draft();
        assert_eq!(draft.id.as_deref(), Some(incident.id.as_str()));
        assert_eq!(draft.victim.as_deref(), Some(""));
        let location = draft.location.expect("location");
        assert_eq!(location.lat, incident.location.lat);
        assert_eq!(location.address, incident.location.address);
    }
}
