// src/services/document_service.rs

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ClientRepository,
    models::{
        client::{Client, ContactLinks},
        workflow::Pipeline,
    },
    services::workflow,
};

/// Conteúdo da ficha, separado da renderização.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetContent {
    pub title: String,
    pub contact: Vec<String>,
    pub position: String,
    pub groups: Vec<(String, Vec<String>)>,
    pub tracking_url: Option<String>,
}

impl SheetContent {
    pub fn build(client: &Client, public_site_url: Option<&str>) -> Self {
        let mut contact = vec![format!("Client : {}", client.full_name)];
        if let Some(phone) = &client.phone {
            contact.push(format!("Téléphone : {}", phone));
        }
        if let Some(address) = &client.address {
            contact.push(format!("Adresse : {}", address));
        }
        if let Some(maps) = ContactLinks::for_client(client).maps {
            contact.push(maps);
        }
        contact.push(if client.is_pickup() {
            "Mode : collecte à domicile".to_string()
        } else {
            "Mode : dépôt à l'atelier".to_string()
        });

        let position = match Pipeline::for_stage(client.crm_stage) {
            Some(pipeline) => {
                let substage = workflow::classify(pipeline, Some(&client.workflow_state));
                format!("Étape : {}", substage.label(pipeline))
            }
            None => format!("Étape CRM : {:?}", client.crm_stage),
        };

        let groups = client
            .checklists
            .iter()
            .map(|(name, checklist)| {
                let lines = checklist
                    .items
                    .iter()
                    .map(|item| {
                        let mark = if item.is_checked() { "[x]" } else { "[ ]" };
                        format!("{} {}", mark, item.label.as_deref().unwrap_or(&item.id))
                    })
                    .collect();
                (name.clone(), lines)
            })
            .collect();

        Self {
            title: format!("FICHE ATELIER {}", client.tracking_label()),
            contact,
            position,
            groups,
            tracking_url: public_site_url.map(|base| format!("{}/suivi/{}", base, client.tracking_id)),
        }
    }
}

#[derive(Clone)]
pub struct DocumentService {
    repo: ClientRepository,
    company_name: String,
    public_site_url: Option<String>,
    fonts_dir: String,
}

impl DocumentService {
    pub fn new(
        repo: ClientRepository,
        company_name: String,
        public_site_url: Option<String>,
        fonts_dir: String,
    ) -> Self {
        Self { repo, company_name, public_site_url, fonts_dir }
    }

    pub async fn generate_sheet_pdf<'e, E>(&self, executor: E, client_id: Uuid) -> Result<Vec<u8>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // 1. Busca os Dados
        let client = self
            .repo
            .find_by_id(executor, client_id)
            .await?
            .ok_or(AppError::ClientNotFound(client_id))?;

        let content = SheetContent::build(&client, self.public_site_url.as_deref());

        // 2. Configura o PDF
        // Carrega a fonte da pasta configurada (FONTS_DIR)
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None)
            .map_err(|_| AppError::FontNotFound(format!("Roboto em {}", self.fonts_dir)))?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(content.title.clone());
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(elements::Paragraph::new(self.company_name.clone())
            .styled(style::Style::new().bold().with_font_size(18)));
        doc.push(elements::Break::new(1.5));
        doc.push(elements::Paragraph::new(content.title)
            .styled(style::Style::new().bold().with_font_size(14)));
        doc.push(elements::Paragraph::new(format!("Date : {}", client.updated_at.format("%d/%m/%Y"))));
        doc.push(elements::Break::new(1));

        for line in content.contact {
            doc.push(elements::Paragraph::new(line).styled(style::Style::new().with_font_size(10)));
        }
        doc.push(elements::Break::new(1));
        doc.push(elements::Paragraph::new(content.position).styled(style::Style::new().bold()));
        doc.push(elements::Break::new(1.5));

        // --- CHECKLISTS ---
        for (group, lines) in content.groups {
            doc.push(elements::Paragraph::new(group.to_uppercase())
                .styled(style::Style::new().bold().with_font_size(12)));
            for line in lines {
                doc.push(elements::Paragraph::new(line));
            }
            doc.push(elements::Break::new(1));
        }

        // --- QR CODE DE ACOMPANHAMENTO ---
        if let Some(url) = content.tracking_url {
            doc.push(elements::Paragraph::new("Suivi en ligne").styled(style::Style::new().bold()));
            doc.push(elements::Paragraph::new(url.clone()).styled(style::Style::new().with_font_size(8)));

            let code = QrCode::new(url.as_bytes())
                .map_err(|e| AppError::Document(e.to_string()))?;

            let image_buffer = code.render::<Luma<u8>>().build();
            let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);

            let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
                .map_err(|e| AppError::Document(e.to_string()))?
                .with_scale(genpdf::Scale::new(0.5, 0.5));

            doc.push(pdf_image);
        }

        // 3. Renderiza para Buffer (Memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::Document(e.to_string()))?;

        tracing::debug!(%client_id, bytes = buffer.len(), "📄 Ficha gerada");
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::{fixtures::client, CrmStage};
    use serde_json::json;

    #[test]
    fn sheet_lists_checklists_and_position() {
        let c = client(
            CrmStage::Atelier,
            json!({"diagnostic_done": true}),
            json!({"diagnostic": {"items": [
                {"id": "d1", "checked": true, "label": "Batterie"},
                {"id": "d4", "checked": false}
            ]}}),
        );

        let sheet = SheetContent::build(&c, Some("https://example.com"));

        assert_eq!(sheet.title, "FICHE ATELIER #0007");
        assert_eq!(sheet.position, "Étape : reparation");
        assert_eq!(
            sheet.groups,
            vec![("diagnostic".to_string(), vec!["[x] Batterie".to_string(), "[ ] d4".to_string()])]
        );
        assert_eq!(sheet.tracking_url.as_deref(), Some("https://example.com/suivi/7"));
        assert!(sheet.contact.iter().any(|l| l == "Mode : dépôt à l'atelier"));
    }

    #[test]
    fn sheet_outside_workshop_shows_crm_stage() {
        let c = client(CrmStage::DevisEnvoye, json!({}), json!({}));
        let sheet = SheetContent::build(&c, None);
        assert_eq!(sheet.position, "Étape CRM : DevisEnvoye");
        assert!(sheet.tracking_url.is_none());
        assert!(sheet.groups.is_empty());
    }
}
