use crate::schema::TidlConfigSchema;

pub type TidlConfig = TidlConfigSchema;

impl TidlConfig {
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<TidlConfigSchema>(json_str)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str::<TidlConfigSchema>(yaml_str)
    }
}
