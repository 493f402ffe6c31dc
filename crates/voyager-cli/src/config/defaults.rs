use voyager::core::wafer::DEFAULT_WAFER_LAYOUT;

pub struct DefaultsConfig {
    pub wafer_layout: String,
    pub view: String,
    pub layers: Vec<u32>,
    pub dose_factor: f64,
    pub sort: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            wafer_layout: DEFAULT_WAFER_LAYOUT.to_string(),
            view: "default".to_string(),
            layers: vec![0],
            dose_factor: 1.0,
            sort: true,
        }
    }
}
