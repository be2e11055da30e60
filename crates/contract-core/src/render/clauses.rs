//! Fixed legal clauses of the urban housing lease.
//!
//! Bodies only interpolate resolved values; absent parties arrive here already
//! replaced by the placeholder.

use super::Terms;

/// A numbered clause: the title is printed after its ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub title: String,
    pub body: String,
}

impl Clause {
    fn new(title: &str, body: String) -> Self {
        Self {
            title: title.to_string(),
            body,
        }
    }
}

const ORDINAL_UNITS: [&str; 9] = [
    "PRIMERA", "SEGUNDA", "TERCERA", "CUARTA", "QUINTA", "SEXTA", "SÉPTIMA", "OCTAVA", "NOVENA",
];

const ORDINAL_TENS: [&str; 4] = ["DÉCIMA", "VIGÉSIMA", "TRIGÉSIMA", "CUADRAGÉSIMA"];

/// Feminine ordinal for clause numbering ("PRIMERA", "DÉCIMA TERCERA").
pub fn ordinal(n: usize) -> String {
    match (n / 10, n % 10) {
        (0, 0) => "0".to_string(),
        (0, u) => ORDINAL_UNITS[u - 1].to_string(),
        (t @ 1..=4, 0) => ORDINAL_TENS[t - 1].to_string(),
        (t @ 1..=4, u) => format!("{} {}", ORDINAL_TENS[t - 1], ORDINAL_UNITS[u - 1]),
        _ => n.to_string(),
    }
}

/// The ordered clause list followed by any free-text additional clauses.
pub fn clauses(t: &Terms, additional: &[String]) -> Vec<Clause> {
    let mut clauses = vec![
        Clause::new(
            "OBJETO",
            format!(
                "Por medio del presente contrato EL ARRENDADOR, {}, identificado(a) con \
                 documento No. {}, entrega a título de arrendamiento a EL ARRENDATARIO, {}, \
                 identificado(a) con documento No. {}, el uso y goce del {} ubicado en {} de la \
                 ciudad de {}, con matrícula inmobiliaria No. {}.",
                t.landlord.full_name,
                t.landlord.id_number,
                t.tenant.full_name,
                t.tenant.id_number,
                t.property_type,
                t.property_address,
                t.city,
                t.registration_number,
            ),
        ),
        Clause::new(
            "PRECIO",
            format!(
                "El precio mensual del arrendamiento es la suma de {} PESOS M/CTE ({}), que EL \
                 ARRENDATARIO pagará a EL ARRENDADOR de manera anticipada.",
                t.rent_words, t.rent_amount,
            ),
        ),
        Clause::new(
            "OPORTUNIDAD DEL PAGO",
            format!(
                "EL ARRENDATARIO pagará el canon dentro de los primeros {} ({}) días de cada \
                 periodo mensual, en el lugar o la cuenta que EL ARRENDADOR indique por escrito.",
                t.due_day_words, t.due_day,
            ),
        ),
        Clause::new(
            "MORA",
            format!(
                "El pago por fuera del plazo pactado causará a cargo de EL ARRENDATARIO una \
                 penalidad de {} PESOS M/CTE ({}) por cada mes o fracción de retardo, sin \
                 perjuicio de las demás acciones legales.",
                t.late_fee_words, t.late_fee_amount,
            ),
        ),
        Clause::new(
            "DEPÓSITO",
            format!(
                "A la firma del presente contrato EL ARRENDATARIO entrega la suma de {} PESOS \
                 M/CTE ({}) como depósito, que será devuelta a la restitución del inmueble una vez \
                 descontados los daños y las obligaciones pendientes.",
                t.deposit_words, t.deposit_amount,
            ),
        ),
        Clause::new(
            "TÉRMINO",
            format!(
                "El término de duración del presente contrato es de {} ({}) meses, contados a \
                 partir del {} y hasta el {}.",
                t.months_words, t.months, t.start_date, t.end_date,
            ),
        ),
        Clause::new(
            "DESTINACIÓN",
            "EL ARRENDATARIO destinará el inmueble exclusivamente para vivienda de él y su \
             familia, y no podrá darle un uso distinto sin autorización escrita de EL ARRENDADOR."
                .to_string(),
        ),
        Clause::new(
            "SERVICIOS PÚBLICOS",
            "Los servicios públicos domiciliarios de agua, energía, gas y aseo, así como las \
             cuotas ordinarias de administración, estarán a cargo de EL ARRENDATARIO durante la \
             vigencia del contrato."
                .to_string(),
        ),
        Clause::new(
            "REPARACIONES Y MEJORAS",
            "EL ARRENDATARIO realizará las reparaciones locativas que demande el uso normal del \
             inmueble. Las mejoras requieren autorización escrita de EL ARRENDADOR y quedarán en \
             beneficio del inmueble."
                .to_string(),
        ),
        Clause::new(
            "CESIÓN Y SUBARRIENDO",
            "EL ARRENDATARIO no podrá ceder el presente contrato ni subarrendar total o \
             parcialmente el inmueble sin autorización previa y escrita de EL ARRENDADOR."
                .to_string(),
        ),
        Clause::new(
            "RESTITUCIÓN",
            "Al vencimiento del término EL ARRENDATARIO restituirá el inmueble en el mismo estado \
             en que lo recibió, salvo el deterioro natural causado por el uso legítimo, junto con \
             los paz y salvos de servicios públicos."
                .to_string(),
        ),
        Clause::new(
            "DEUDOR SOLIDARIO",
            format!(
                "{}, identificado(a) con documento No. {}, se obliga como deudor solidario de EL \
                 ARRENDATARIO por todas las obligaciones derivadas del presente contrato.",
                t.co_signer.full_name, t.co_signer.id_number,
            ),
        ),
        Clause::new(
            "TESTIGO",
            format!(
                "El presente contrato se suscribe en presencia de {}, identificado(a) con \
                 documento No. {}, quien actúa como testigo.",
                t.witness.full_name, t.witness.id_number,
            ),
        ),
        Clause::new(
            "MÉRITO EJECUTIVO",
            "Las partes reconocen que el presente contrato presta mérito ejecutivo para el cobro \
             de los cánones, penalidades y demás sumas a cargo de EL ARRENDATARIO."
                .to_string(),
        ),
        Clause::new(
            "NOTIFICACIONES",
            format!(
                "EL ARRENDADOR recibirá notificaciones en {} y en el correo {}; EL ARRENDATARIO \
                 en el inmueble arrendado y en el correo {}.",
                t.landlord.address, t.landlord.email, t.tenant.email,
            ),
        ),
        Clause::new(
            "FIRMA ELECTRÓNICA",
            "Las partes aceptan que el presente documento sea firmado electrónicamente y que la \
             firma así impuesta tenga la misma validez que la firma manuscrita."
                .to_string(),
        ),
    ];

    clauses.extend(
        additional
            .iter()
            .filter(|text| !text.trim().is_empty())
            .map(|text| Clause::new("CLÁUSULA ADICIONAL", text.trim().to_string())),
    );

    clauses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(1), "PRIMERA");
        assert_eq!(ordinal(7), "SÉPTIMA");
        assert_eq!(ordinal(10), "DÉCIMA");
        assert_eq!(ordinal(13), "DÉCIMA TERCERA");
        assert_eq!(ordinal(20), "VIGÉSIMA");
        assert_eq!(ordinal(21), "VIGÉSIMA PRIMERA");
        assert_eq!(ordinal(49), "CUADRAGÉSIMA NOVENA");
        assert_eq!(ordinal(50), "50");
    }
}
