//! Risk questionnaire and review sign-offs.
//!
//! Both are stored as nested objects on the experiment. Every answer is
//! tri-state: `None` means the question has not been answered yet.

use serde::{Deserialize, Serialize};

use crate::models::experiment::choice_enum;

/// Answers to the risk questionnaire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAssessment {
    pub internal_only: Option<bool>,
    pub partner_related: Option<bool>,
    pub brand: Option<bool>,
    pub fast_shipped: Option<bool>,
    pub confidential: Option<bool>,
    pub release_population: Option<bool>,
    pub revenue: Option<bool>,
    pub data_category: Option<bool>,
    pub external_team_impact: Option<bool>,
    pub telemetry_data: Option<bool>,
    pub ux: Option<bool>,
    pub security: Option<bool>,
    pub revision: Option<bool>,
    pub technical: Option<bool>,
}

impl RiskAssessment {
    /// Every question answered with `value`.
    pub fn all(value: bool) -> Self {
        let v = Some(value);
        Self {
            internal_only: v,
            partner_related: v,
            brand: v,
            fast_shipped: v,
            confidential: v,
            release_population: v,
            revenue: v,
            data_category: v,
            external_team_impact: v,
            telemetry_data: v,
            ux: v,
            security: v,
            revision: v,
            technical: v,
        }
    }

    /// `(field name, answer)` in questionnaire order.
    pub fn answers(&self) -> [(&'static str, Option<bool>); 14] {
        [
            ("risk_internal_only", self.internal_only),
            ("risk_partner_related", self.partner_related),
            ("risk_brand", self.brand),
            ("risk_fast_shipped", self.fast_shipped),
            ("risk_confidential", self.confidential),
            ("risk_release_population", self.release_population),
            ("risk_revenue", self.revenue),
            ("risk_data_category", self.data_category),
            ("risk_external_team_impact", self.external_team_impact),
            ("risk_telemetry_data", self.telemetry_data),
            ("risk_ux", self.ux),
            ("risk_security", self.security),
            ("risk_revision", self.revision),
            ("risk_technical", self.technical),
        ]
    }

    pub fn any_true(&self) -> bool {
        self.answers().iter().any(|(_, a)| *a == Some(true))
    }

    pub fn all_answered(&self) -> bool {
        self.answers().iter().all(|(_, a)| a.is_some())
    }
}

choice_enum! {
    /// A single sign-off on the review checklist.
    Review, "review" {
        Science => "review_science", "Data Science Peer Review";
        Advisory => "review_advisory", "Lightning Advisory (Optional)";
        Engineering => "review_engineering", "Engineering Allocated";
        QaRequested => "review_qa_requested", "QA Jira Request Sent";
        IntentToShip => "review_intent_to_ship", "Intent to Ship Email Sent";
        Bugzilla => "review_bugzilla", "Bugzilla Updated";
        Qa => "review_qa", "QA Sign-Off";
        Relman => "review_relman", "Release Management Sign-Off";
        Legal => "review_legal", "Legal Review";
        Ux => "review_ux", "UX Review";
        Security => "review_security", "Security Review";
        Vp => "review_vp", "VP Sign Off";
        DataSteward => "review_data_steward", "Data Steward Review";
        Comms => "review_comms", "Mozilla Press/Comms";
        ImpactedTeams => "review_impacted_teams", "Impacted Team(s) Signed-Off";
    }
}

impl Review {
    /// Reviews every experiment needs, before risk-driven additions.
    pub const DEFAULT_REQUIRED: &'static [Review] = &[
        Review::Science,
        Review::Advisory,
        Review::Engineering,
        Review::QaRequested,
        Review::IntentToShip,
        Review::Bugzilla,
        Review::Qa,
        Review::Relman,
    ];
}

/// Sign-off checklist state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSignOffs {
    pub science: Option<bool>,
    pub engineering: Option<bool>,
    pub qa_requested: Option<bool>,
    pub intent_to_ship: Option<bool>,
    pub bugzilla: Option<bool>,
    pub qa: Option<bool>,
    pub relman: Option<bool>,
    pub advisory: Option<bool>,
    pub legal: Option<bool>,
    pub ux: Option<bool>,
    pub security: Option<bool>,
    pub vp: Option<bool>,
    pub data_steward: Option<bool>,
    pub comms: Option<bool>,
    pub impacted_teams: Option<bool>,
}

impl ReviewSignOffs {
    pub fn get(&self, review: Review) -> Option<bool> {
        match review {
            Review::Science => self.science,
            Review::Advisory => self.advisory,
            Review::Engineering => self.engineering,
            Review::QaRequested => self.qa_requested,
            Review::IntentToShip => self.intent_to_ship,
            Review::Bugzilla => self.bugzilla,
            Review::Qa => self.qa,
            Review::Relman => self.relman,
            Review::Legal => self.legal,
            Review::Ux => self.ux,
            Review::Security => self.security,
            Review::Vp => self.vp,
            Review::DataSteward => self.data_steward,
            Review::Comms => self.comms,
            Review::ImpactedTeams => self.impacted_teams,
        }
    }

    pub fn set(&mut self, review: Review, value: Option<bool>) {
        let slot = match review {
            Review::Science => &mut self.science,
            Review::Advisory => &mut self.advisory,
            Review::Engineering => &mut self.engineering,
            Review::QaRequested => &mut self.qa_requested,
            Review::IntentToShip => &mut self.intent_to_ship,
            Review::Bugzilla => &mut self.bugzilla,
            Review::Qa => &mut self.qa,
            Review::Relman => &mut self.relman,
            Review::Legal => &mut self.legal,
            Review::Ux => &mut self.ux,
            Review::Security => &mut self.security,
            Review::Vp => &mut self.vp,
            Review::DataSteward => &mut self.data_steward,
            Review::Comms => &mut self.comms,
            Review::ImpactedTeams => &mut self.impacted_teams,
        };
        *slot = value;
    }

    pub fn is_checked(&self, review: Review) -> bool {
        self.get(review) == Some(true)
    }

    /// All sign-offs required for an experiment with the given risks.
    pub fn required(risks: &RiskAssessment) -> Vec<Review> {
        let yes = |a: Option<bool>| a == Some(true);
        let mut required = Review::DEFAULT_REQUIRED.to_vec();

        let conditional = [
            (
                Review::Vp,
                [
                    risks.partner_related,
                    risks.brand,
                    risks.fast_shipped,
                    risks.confidential,
                    risks.release_population,
                    risks.revenue,
                ]
                .into_iter()
                .any(yes),
            ),
            (
                Review::Legal,
                yes(risks.partner_related) || yes(risks.data_category),
            ),
            (Review::ImpactedTeams, yes(risks.external_team_impact)),
            (Review::DataSteward, yes(risks.telemetry_data)),
            (Review::Ux, yes(risks.ux)),
            (Review::Security, yes(risks.security)),
        ];
        required.extend(
            conditional
                .into_iter()
                .filter_map(|(review, needed)| needed.then_some(review)),
        );
        required
    }

    /// Sign-offs not required for the given risks, sorted by field name.
    pub fn optional(risks: &RiskAssessment) -> Vec<Review> {
        let required = Self::required(risks);
        let mut optional: Vec<Review> = Review::ALL
            .iter()
            .copied()
            .filter(|r| !required.contains(r))
            .collect();
        optional.sort_by_key(|r| r.as_str());
        optional
    }

    /// Every required sign-off is checked. The advisory review never
    /// blocks a launch.
    pub fn completed_required(&self, risks: &RiskAssessment) -> bool {
        Self::required(risks)
            .into_iter()
            .filter(|r| *r != Review::Advisory)
            .all(|r| self.is_checked(r))
    }
}
