use std::collections::BTreeMap;

use super::model::{Incident, IncidentStatus, Location};

const SEED_REPORTER: &str = "P/3 - 43° BPM";

/// Example incidents shown on first run, before anything has been persisted.
pub fn incidents() -> Vec<Incident> {
    vec![
        seed(
            "seed-0001",
            "2024/004512",
            "A01.2024.0451",
            "Roubo a transeunte",
            "Vítima abordada por dois indivíduos em motocicleta; celular subtraído.",
            "Av. dos Holandeses, Calhau",
            "2024-03-10T22:15:00.000Z",
            IncidentStatus::Open,
            Extras {
                victim: Some("M. S. Araújo"),
                garrison: Some("VTR 43-01"),
                vehicle: Some("Motocicleta vermelha sem placa"),
                stolen: Some("Aparelho celular"),
            },
        ),
        seed(
            "seed-0002",
            "2024/004498",
            "B07.2024.0112",
            "Furto de veículo",
            "Veículo estacionado em via pública não localizado pelo proprietário.",
            "Rua do Sol, Centro",
            "2024-03-09T08:40:00.000Z",
            IncidentStatus::Concluded,
            Extras {
                victim: Some("J. P. Ribeiro"),
                garrison: Some("VTR 43-04"),
                vehicle: Some("Fiat Uno prata"),
                stolen: None,
            },
        ),
        seed(
            "seed-0003",
            "2024/004471",
            "C02.2024.0389",
            "Perturbação do sossego",
            "Som automotivo em volume elevado após as 22h.",
            "Praça Deodoro, Centro",
            "2024-03-08T23:55:00.000Z",
            IncidentStatus::Concluded,
            Extras {
                garrison: Some("VTR 43-02"),
                ..Extras::default()
            },
        ),
        seed(
            "seed-0004",
            "2024/004430",
            "A01.2024.0433",
            "Tráfico de drogas",
            "Abordagem a suspeito com porções de entorpecente.",
            "Rua Grande, Centro",
            "2024-03-07T16:20:00.000Z",
            IncidentStatus::Open,
            Extras {
                garrison: Some("GTM 43"),
                ..Extras::default()
            },
        ),
    ]
}

#[derive(Default)]
struct Extras {
    victim: Option<&'static str>,
    garrison: Option<&'static str>,
    vehicle: Option<&'static str>,
    stolen: Option<&'static str>,
}

#[allow(clippy::too_many_arguments)]
fn seed(
    id: &str,
    number: &str,
    sigma: &str,
    kind: &str,
    description: &str,
    address: &str,
    date: &str,
    status: IncidentStatus,
    extras: Extras,
) -> Incident {
    Incident {
        id: id.into(),
        incident_number: number.into(),
        sigma: sigma.into(),
        kind: kind.into(),
        description: description.into(),
        location: Location::from_address(address),
        date: date.into(),
        status,
        victim: extras.victim.map(Into::into),
        garrison: extras.garrison.map(Into::into),
        vehicle_details: extras.vehicle.map(Into::into),
        stolen_details: extras.stolen.map(Into::into),
        reported_by: SEED_REPORTER.into(),
        created_at: date.into(),
        extra: BTreeMap::new(),
    }
}
