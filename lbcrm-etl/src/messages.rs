//! Templated outreach messages per segment

use crate::segment::{Segment, Segmentation};
use lbcrm_common::db::RecencyRow;
use lbcrm_common::time::format_br_date;
use serde::Serialize;
use std::collections::BTreeMap;

const FALLBACK_FIRST_NAME: &str = "Cliente";
const FALLBACK_DATE: &str = "data não disponível";
const FALLBACK_DAYS: &str = "alguns";

const RECENTLY_ACTIVE_BODY: &str = "Olá {first_name},

Esperamos que esteja aproveitando sua compra recente na Lui Bambini!

Gostaríamos de agradecer pela sua preferência e confiança em nossos produtos. Sua última compra foi em {last_purchase_date}.

Temos novidades chegando que podem combinar perfeitamente com o que você adquiriu. Que tal dar uma olhada em nosso catálogo?

Estamos à disposição para qualquer dúvida ou sugestão.

Atenciosamente,
Equipe Lui Bambini";

const ACTIVE_BODY: &str = "Olá {first_name},

Notamos que já faz {elapsed_days} dias desde sua última visita à Lui Bambini.

Sua última compra foi em {last_purchase_date} e gostaríamos de informar que temos muitas novidades em nosso catálogo que podem ser do seu interesse.

Que tal nos visitar novamente? Estamos com produtos exclusivos que combinam com seu estilo!

Atenciosamente,
Equipe Lui Bambini";

const AT_RISK_BODY: &str = "Olá {first_name},

Sentimos sua falta! Já faz {elapsed_days} dias desde sua última compra na Lui Bambini.

Gostaríamos de convidá-lo(a) a conhecer nossa nova coleção que acabou de chegar. Temos certeza que você vai adorar!

Como cliente especial, preparamos uma surpresa para sua próxima compra. Venha conferir!

Atenciosamente,
Equipe Lui Bambini";

const INACTIVE_BODY: &str = "Olá {first_name},

Notamos que faz um bom tempo desde sua última visita à Lui Bambini ({elapsed_days} dias).

Gostaríamos muito de tê-lo(a) de volta! Por isso, preparamos uma oferta especial exclusiva para você.

Na sua próxima compra, apresente este e-mail e ganhe 10% de desconto em qualquer produto da loja.

Estamos ansiosos para revê-lo(a)!

Atenciosamente,
Equipe Lui Bambini";

const LOST_BODY: &str = "Olá {first_name},

Faz mais de um ano desde sua última compra na Lui Bambini e gostaríamos muito de reconquistar você como cliente!

Nosso catálogo está completamente renovado e temos certeza que você vai se surpreender com nossas novidades.

Como um gesto especial, oferecemos 15% de desconto na sua próxima compra. Basta mencionar este e-mail.

Ficaremos muito felizes em recebê-lo(a) novamente!

Atenciosamente,
Equipe Lui Bambini";

/// Subject and body template of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTemplate {
    pub subject: &'static str,
    pub body: &'static str,
}

impl MessageTemplate {
    pub fn for_segment(segment: Segment) -> Self {
        let (subject, body) = match segment {
            Segment::RecentlyActive => (
                "Obrigado pela sua compra recente na Lui Bambini!",
                RECENTLY_ACTIVE_BODY,
            ),
            Segment::Active => ("Sentimos sua falta na Lui Bambini!", ACTIVE_BODY),
            Segment::AtRisk => ("Estamos com saudades! Volte à Lui Bambini", AT_RISK_BODY),
            Segment::Inactive => (
                "Sentimos sua falta! Oferta especial para você voltar à Lui Bambini",
                INACTIVE_BODY,
            ),
            Segment::Lost => (
                "Queremos reconquistar você! Oferta exclusiva da Lui Bambini",
                LOST_BODY,
            ),
        };
        Self { subject, body }
    }

    /// Fill `{first_name}`, `{last_purchase_date}` and `{elapsed_days}`
    pub fn render(&self, row: &RecencyRow) -> String {
        let date = row
            .last_purchase
            .map(format_br_date)
            .unwrap_or_else(|| FALLBACK_DATE.to_string());
        let days = row
            .elapsed_days
            .map(|d| d.to_string())
            .unwrap_or_else(|| FALLBACK_DAYS.to_string());

        // Single pass, so substituted values are never scanned again
        let mut rendered = String::with_capacity(self.body.len() + 32);
        let mut rest = self.body;
        while let Some(open) = rest.find('{') {
            let Some(len) = rest[open..].find('}') else {
                break;
            };
            let close = open + len;
            rendered.push_str(&rest[..open]);
            let text = match &rest[open + 1..close] {
                "first_name" => first_name(&row.customer_name),
                "last_purchase_date" => date.as_str(),
                "elapsed_days" => days.as_str(),
                _ => &rest[open..=close],
            };
            rendered.push_str(text);
            rest = &rest[close + 1..];
        }
        rendered.push_str(rest);
        rendered
    }
}

/// First whitespace-separated token, or the generic greeting
pub fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or(FALLBACK_FIRST_NAME)
}

/// One personalized message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutreachMessage {
    #[serde(rename = "cliente_id")]
    pub customer_id: Option<i64>,
    #[serde(rename = "cliente_nome")]
    pub customer_name: String,
    #[serde(rename = "cliente_cpf")]
    pub tax_id: String,
    #[serde(rename = "dias_desde_ultima_compra")]
    pub elapsed_days: Option<i64>,
    #[serde(rename = "assunto")]
    pub subject: String,
    #[serde(rename = "mensagem")]
    pub body: String,
}

/// Message for one customer of a segment
pub fn render_message(segment: Segment, row: &RecencyRow) -> OutreachMessage {
    let template = MessageTemplate::for_segment(segment);
    OutreachMessage {
        customer_id: row.customer_id,
        customer_name: row.customer_name.clone(),
        tax_id: row.tax_id.clone(),
        elapsed_days: row.elapsed_days,
        subject: template.subject.to_string(),
        body: template.render(row),
    }
}

/// Full message list for every segment, in band order
pub fn generate_messages(segmentation: &Segmentation) -> BTreeMap<Segment, Vec<OutreachMessage>> {
    segmentation
        .iter()
        .map(|(segment, rows)| {
            let messages = rows.iter().map(|row| render_message(segment, row)).collect();
            (segment, messages)
        })
        .collect()
}

/// Leading messages kept as a persisted sample
pub fn sample(messages: &[OutreachMessage], size: usize) -> &[OutreachMessage] {
    &messages[..messages.len().min(size)]
}
