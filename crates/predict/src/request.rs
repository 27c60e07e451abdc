use std::collections::HashMap;

use {
    prophet_config::{ModelCatalog, ModelDescriptor},
    serde::Serialize,
};

use crate::error::PredictionError;

/// One prediction call: which trained model, and its CSV instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub model_id: String,
    pub csv_instance: Vec<String>,
}

/// Feature values in the descriptor's field order. A field the user left
/// out contributes an empty string so positions stay aligned.
pub fn build_feature_vector(
    descriptor: &ModelDescriptor,
    values: &HashMap<String, String>,
) -> Vec<String> {
    descriptor
        .labels()
        .map(|label| values.get(label).cloned().unwrap_or_default())
        .collect()
}

impl PredictionRequest {
    /// Resolve `model_name` in the catalog and build its feature vector
    /// from the submitted form values.
    pub fn from_form(
        catalog: &ModelCatalog,
        model_name: &str,
        values: &HashMap<String, String>,
    ) -> Result<Self, PredictionError> {
        if model_name.is_empty() {
            return Err(PredictionError::MissingModel);
        }
        let descriptor = catalog
            .get(model_name)
            .ok_or_else(|| PredictionError::UnknownModel(model_name.to_string()))?;
        Ok(Self {
            model_id: descriptor.model_id.clone(),
            csv_instance: build_feature_vector(descriptor, values),
        })
    }

    pub(crate) fn body(&self) -> PredictBody<'_> {
        PredictBody {
            input: PredictInput {
                csv_instance: &self.csv_instance,
            },
        }
    }
}

#[derive(Serialize)]
pub(crate) struct PredictBody<'a> {
    input: PredictInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictInput<'a> {
    csv_instance: &'a [String],
}
