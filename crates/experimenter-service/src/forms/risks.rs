//! Risk questionnaire and testing notes.

use experimenter_core::error::{ExperimenterResult, FormErrors};
use experimenter_core::models::experiment::UpdateExperiment;
use experimenter_core::models::review::RiskAssessment;
use serde::Deserialize;

use super::fields;

pub const RISK_TECHNICAL_LABEL: &str = "Is this experiment technically complex?";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RisksForm {
    pub risk_internal_only: Option<bool>,
    pub risk_partner_related: Option<bool>,
    pub risk_brand: Option<bool>,
    pub risk_fast_shipped: Option<bool>,
    pub risk_confidential: Option<bool>,
    pub risk_release_population: Option<bool>,
    pub risk_revenue: Option<bool>,
    pub risk_data_category: Option<bool>,
    pub risk_external_team_impact: Option<bool>,
    pub risk_telemetry_data: Option<bool>,
    pub risk_ux: Option<bool>,
    pub risk_security: Option<bool>,
    pub risk_revision: Option<bool>,
    pub risk_technical: Option<bool>,
    pub risk_technical_description: Option<String>,
    pub risks: Option<String>,
    pub testing: Option<String>,
    pub test_builds: Option<String>,
    pub qa_status: Option<String>,
}

impl RisksForm {
    fn assessment(&self) -> RiskAssessment {
        RiskAssessment {
            internal_only: self.risk_internal_only,
            partner_related: self.risk_partner_related,
            brand: self.risk_brand,
            fast_shipped: self.risk_fast_shipped,
            confidential: self.risk_confidential,
            release_population: self.risk_release_population,
            revenue: self.risk_revenue,
            data_category: self.risk_data_category,
            external_team_impact: self.risk_external_team_impact,
            telemetry_data: self.risk_telemetry_data,
            ux: self.risk_ux,
            security: self.risk_security,
            revision: self.risk_revision,
            technical: self.risk_technical,
        }
    }

    pub fn clean(self) -> ExperimenterResult<UpdateExperiment> {
        let mut errors = FormErrors::new();
        let assessment = self.assessment();
        for (field, answer) in assessment.answers() {
            if answer.is_none() {
                errors.add(field, fields::REQUIRED);
            }
        }

        let technical_description = fields::text(self.risk_technical_description);
        if assessment.technical == Some(true) && technical_description.is_none() {
            errors.add(
                "risk_technical_description",
                format!("This is required if '{RISK_TECHNICAL_LABEL}' is true."),
            );
        }

        let qa_status = fields::required_text(&mut errors, "qa_status", self.qa_status);

        errors.finish(UpdateExperiment {
            risk_flags: Some(assessment),
            risk_technical_description: Some(technical_description),
            risks: Some(fields::text(self.risks)),
            testing: Some(fields::text(self.testing)),
            test_builds: Some(fields::text(self.test_builds)),
            qa_status: Some(qa_status),
            ..UpdateExperiment::default()
        })
    }
}
