//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is an explicit immutable value handed to the orchestrator and passed
//! by parameter into each stage entry point; no component reads ambient state. The defaults
//! mirror the column names the production mailing files actually carry, so a caller only has
//! to override what its deployment renames.
//!
//! Callers that keep configuration in a file can load it with
//! [`PipelineConfig::from_json_str`]; list-valued settings that arrive as newline- or
//! comma-separated blobs go through [`parse_list`].

use serde::Deserialize;

use crate::error::PipelineResult;

/// Parse a newline- or comma-separated list setting into trimmed, non-empty entries.
///
/// Accepts mixed separators and trailing commas; entries keep their original case (matching
/// against data is case-insensitive at the stage level).
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.replace('\n', ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Customer primary key used for aggregation and deduplication.
    pub primary_key: String,
    /// Customer name column, preferred by the deduplicator's completeness tie-break.
    pub name_column: String,
    /// Schema contract for the mailing dataset, validated at the Load stage.
    pub required_columns: Vec<String>,
    /// Mailing-specific column names for the cleanup stages.
    pub mailing: MailingColumns,
    /// Status-set removal against the blocklist/disposition dataset.
    pub status_removal: StatusRemovalConfig,
    /// Threshold removal against the blocklist/disposition dataset.
    pub threshold_removal: ThresholdRemovalConfig,
    /// Payment-match removal against the payment dataset.
    pub payment_removal: PaymentRemovalConfig,
    /// Phone enrichment join settings.
    pub enrichment: EnrichmentConfig,
    /// Mailing-local block-status filter (keep only unblocked rows).
    pub block_filter: BlockFilterConfig,
    /// Segmentation groups; rows whose product code matches no group reach neither channel.
    pub groups: Vec<SegmentGroup>,
    /// Ordered priority rules for the human channel sort.
    pub priority_order: Vec<PriorityRule>,
    /// Export layout (rename map + principal column prefix).
    pub layout: LayoutConfig,
    /// Robot master table layout.
    pub robot: RobotConfig,
    /// `chrono` format string for the import-date stamp.
    pub import_date_format: String,
}

impl PipelineConfig {
    /// Deserialize a configuration from JSON; absent settings take their defaults.
    pub fn from_json_str(raw: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary_key: "ncpf".to_string(),
            name_column: "nomecad".to_string(),
            required_columns: vec![
                "ncpf".to_string(),
                "nomecad".to_string(),
                "empresa".to_string(),
                "liquido".to_string(),
                "ucv".to_string(),
            ],
            mailing: MailingColumns::default(),
            status_removal: StatusRemovalConfig::default(),
            threshold_removal: ThresholdRemovalConfig::default(),
            payment_removal: PaymentRemovalConfig::default(),
            enrichment: EnrichmentConfig::default(),
            block_filter: BlockFilterConfig::default(),
            groups: Vec::new(),
            priority_order: default_priority_order(),
            layout: LayoutConfig::default(),
            robot: RobotConfig::default(),
            import_date_format: "%d/%m/%Y".to_string(),
        }
    }
}

/// Column names of the mailing dataset that the cleanup stages touch.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailingColumns {
    /// Per-invoice liquid amount column.
    pub amount: String,
    /// Service-point id column.
    pub service_point: String,
    /// Product/company code column.
    pub product: String,
    /// Monetary columns converted from decimal-comma text to floats at cleanup.
    pub financial: Vec<String>,
    /// Columns known to arrive with mojibake that must be repaired.
    pub mojibake: Vec<String>,
    /// Identifier columns that arrive as floats and must become integer text.
    pub integer_text: Vec<String>,
    /// Source column for the "client regularizing" flag.
    pub regularize_source: String,
}

impl Default for MailingColumns {
    fn default() -> Self {
        Self {
            amount: "liquido".to_string(),
            service_point: "ucv".to_string(),
            product: "empresa".to_string(),
            financial: vec![
                "liquido".to_string(),
                "total_toi".to_string(),
                "valor".to_string(),
            ],
            mojibake: vec!["faixa".to_string()],
            integer_text: vec!["ndoc".to_string()],
            regularize_source: "venc_maior_1ano".to_string(),
        }
    }
}

/// Settings for status-set removal against the blocklist/disposition dataset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusRemovalConfig {
    /// External client-id column in the reference dataset.
    pub reference_key: String,
    /// Matching key column in the mailing dataset.
    pub mailing_key: String,
    /// Status column in the reference dataset.
    pub status_column: String,
    /// Disqualifying status values (matched case-insensitively, trimmed).
    pub statuses: Vec<String>,
}

impl Default for StatusRemovalConfig {
    fn default() -> Self {
        Self {
            reference_key: "idcliente".to_string(),
            mailing_key: "ncpf".to_string(),
            status_column: "status".to_string(),
            statuses: Vec::new(),
        }
    }
}

/// Settings for threshold removal: clients with too many critical dispositions are suppressed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdRemovalConfig {
    /// External client-id column in the reference dataset.
    pub reference_key: String,
    /// Matching key column in the mailing dataset.
    pub mailing_key: String,
    /// Status column in the reference dataset.
    pub status_column: String,
    /// Status values counted as critical (matched case-insensitively, trimmed).
    pub critical_statuses: Vec<String>,
    /// Remove mailing rows whose client id reaches this many critical rows.
    pub min_count: usize,
}

impl Default for ThresholdRemovalConfig {
    fn default() -> Self {
        Self {
            reference_key: "idcliente".to_string(),
            mailing_key: "ncpf".to_string(),
            status_column: "status".to_string(),
            critical_statuses: Vec::new(),
            min_count: 3,
        }
    }
}

/// Settings for payment-match removal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentRemovalConfig {
    /// Columns forming the composite key, present in both mailing and payment datasets.
    pub key_columns: Vec<String>,
}

impl Default for PaymentRemovalConfig {
    fn default() -> Self {
        Self {
            key_columns: vec![
                "empresa".to_string(),
                "ucv".to_string(),
                "ano".to_string(),
                "mes".to_string(),
            ],
        }
    }
}

/// Settings for the phone enrichment join.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Document-id column in the enrichment dataset.
    pub document_column: String,
    /// Phone column in the enrichment dataset.
    pub phone_column: String,
    /// Confidence score column in the enrichment dataset.
    pub score_column: String,
    /// Mailing column joined against the enrichment document id.
    pub mailing_key: String,
    /// Phone-like mailing columns appended after the enriched candidates.
    pub native_phone_columns: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            document_column: "documento".to_string(),
            phone_column: "telefone".to_string(),
            score_column: "pontuacao".to_string(),
            mailing_key: "ndoc".to_string(),
            native_phone_columns: vec![
                "ind_telefone_1_valido".to_string(),
                "ind_telefone_2_valido".to_string(),
                "fone_consumidor".to_string(),
            ],
        }
    }
}

/// Mailing-local block filter: only rows whose block column carries `keep_value` survive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlockFilterConfig {
    /// Block/status column in the mailing dataset.
    pub column: String,
    /// Value (case-insensitive, trimmed) marking an unblocked row.
    pub keep_value: String,
}

impl Default for BlockFilterConfig {
    fn default() -> Self {
        Self {
            column: "bloq".to_string(),
            keep_value: "N".to_string(),
        }
    }
}

/// Which rows of a segmentation group's subset go to the robot channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotRule {
    /// Rows under the debt threshold go to the robot; the rest go to the human channel.
    BelowThreshold,
    /// The whole subset also goes to the robot, regardless of debt.
    All,
}

/// A named segmentation group: a set of product codes with a monetary cut.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentGroup {
    /// Group name, used in audit messages.
    pub name: String,
    /// Product/company codes selecting this group's subset (case-insensitive).
    pub product_codes: Vec<String>,
    /// Rows with total debt at or above this value go to the human channel.
    pub debt_threshold: f64,
    /// Robot membership rule for the subset.
    pub robot_rule: RobotRule,
}

/// One rung of the human-channel priority ladder.
///
/// The first rule whose column equals its value (case-insensitive, trimmed) decides the
/// row's tier; rows matching no rule fall into the catch-all tier after the last rung.
#[derive(Debug, Clone, Deserialize)]
pub struct PriorityRule {
    /// Status-like column to inspect.
    pub column: String,
    /// Value assigning this tier.
    pub value: String,
}

fn default_priority_order() -> Vec<PriorityRule> {
    [
        ("faixa", "A VENCER"),
        ("sit", "LIGADO"),
        ("iu12m", "SIM"),
        ("sit", "DESLIGADO"),
        ("sit", "INATIVO"),
    ]
    .into_iter()
    .map(|(column, value)| PriorityRule {
        column: column.to_string(),
        value: value.to_string(),
    })
    .collect()
}

/// Export layout: rename map, principal prefix, and currency rendering targets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Old-name to new-name column map.
    pub rename: Vec<(String, String)>,
    /// Fixed ordered prefix of principal columns; absent ones are filled with blanks.
    pub principal_columns: Vec<String>,
    /// Aggregated debt column (post-rename name); rendered with two decimals and a comma.
    pub debt_column: String,
    /// Additional monetary columns rendered with two decimals and a comma.
    pub currency_columns: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let rename = [
            ("nomecad", "NOME_CLIENTE"),
            ("empresa", "PRODUTO"),
            ("ncpf", "CPF"),
            ("totfat", "parcelasEmAtraso"),
            ("loc", "LOCALIDADE"),
            ("quantidade_uc_por_cpf", "Quantidade_UC_por_CPF"),
            ("ucs_do_cpf", "Ucs_do_CPF"),
            ("cliente_regulariza", "Cliente_Regulariza"),
            ("telefone_01", "TELEFONE_01"),
            ("telefone_02", "TELEFONE_02"),
            ("telefone_03", "TELEFONE_03"),
            ("telefone_04", "TELEFONE_04"),
            ("quantidades_de_acionamentos", "Quantidades_de_Acionamentos"),
            ("valordivida", "valorDivida"),
            ("data_de_importacao", "Data_de_Importacao"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();

        let principal_columns = [
            "NOME_CLIENTE",
            "PRODUTO",
            "CPF",
            "parcelasEmAtraso",
            "Quantidade_UC_por_CPF",
            "Ucs_do_CPF",
            "LOCALIDADE",
            "valorDivida",
            "Cliente_Regulariza",
            "TELEFONE_01",
            "TELEFONE_02",
            "TELEFONE_03",
            "TELEFONE_04",
            "Quantidades_de_Acionamentos",
            "Data_de_Importacao",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            rename,
            principal_columns,
            debt_column: "valorDivida".to_string(),
            currency_columns: vec![
                "liquido".to_string(),
                "total_toi".to_string(),
                "valor".to_string(),
            ],
        }
    }
}

/// Robot master table layout (post-layout column names on the robot channel).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Customer key column after layout mapping.
    pub customer_column: String,
    /// Customer name column after layout mapping.
    pub name_column: String,
    /// Product column after layout mapping.
    pub product_column: String,
    /// Installments-in-arrears column after layout mapping.
    pub installments_column: String,
    /// Aggregated debt column after layout mapping.
    pub debt_column: String,
    /// Invoice due-date column (source name, untouched by the rename map).
    pub due_date_column: String,
    /// Invoice amount column (source name).
    pub amount_column: String,
    /// Invoice barcode column (source name).
    pub barcode_column: String,
    /// Negotiation justification column (source name).
    pub justification_column: String,
    /// Phone slots copied into the robot layout, in order.
    pub phone_columns: Vec<String>,
    /// `chrono` format for parsing and rendering due dates (day-first).
    pub date_format: String,
    /// Constant payment profile stamped on every robot row.
    pub payment_profile: String,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            customer_column: "CPF".to_string(),
            name_column: "NOME_CLIENTE".to_string(),
            product_column: "PRODUTO".to_string(),
            installments_column: "parcelasEmAtraso".to_string(),
            debt_column: "valorDivida".to_string(),
            due_date_column: "dtvenc".to_string(),
            amount_column: "liquido".to_string(),
            barcode_column: "codbarra".to_string(),
            justification_column: "just".to_string(),
            phone_columns: vec!["TELEFONE_01".to_string(), "TELEFONE_02".to_string()],
            date_format: "%d/%m/%Y".to_string(),
            payment_profile: "VISTA".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_list, PipelineConfig, RobotRule};

    #[test]
    fn parse_list_handles_newlines_commas_and_blanks() {
        let raw = "CONTA PAGA CLIENTE\nFALECIDO, ACORDO JURIDICO,\n\n  DESLIGADO  ";
        assert_eq!(
            parse_list(raw),
            vec![
                "CONTA PAGA CLIENTE",
                "FALECIDO",
                "ACORDO JURIDICO",
                "DESLIGADO"
            ]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn default_config_uses_canonical_customer_key() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.primary_key, "ncpf");
        assert_eq!(cfg.threshold_removal.min_count, 3);
        assert_eq!(cfg.layout.principal_columns[0], "NOME_CLIENTE");
        assert_eq!(cfg.priority_order.len(), 5);
    }

    #[test]
    fn from_json_str_fills_absent_settings_with_defaults() {
        let raw = r#"{
            "status_removal": { "statuses": ["CONTA PAGA CLIENTE"] },
            "groups": [
                {
                    "name": "special",
                    "product_codes": ["EPB", "EFL"],
                    "debt_threshold": 500.0,
                    "robot_rule": "below_threshold"
                }
            ]
        }"#;
        let cfg = PipelineConfig::from_json_str(raw).unwrap();
        assert_eq!(cfg.status_removal.statuses, vec!["CONTA PAGA CLIENTE"]);
        assert_eq!(cfg.groups.len(), 1);
        assert_eq!(cfg.groups[0].robot_rule, RobotRule::BelowThreshold);
        // Untouched settings keep their defaults.
        assert_eq!(cfg.primary_key, "ncpf");
        assert_eq!(cfg.enrichment.mailing_key, "ndoc");
    }

    #[test]
    fn from_json_str_rejects_malformed_input() {
        assert!(PipelineConfig::from_json_str("{ not json").is_err());
    }
}
