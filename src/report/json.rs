use anyhow::Result;

use crate::orchestrator::ManagerReport;

pub fn render(reports: &[ManagerReport]) -> Result<()> {
    println!("{}", to_json(reports)?);
    Ok(())
}

fn to_json(reports: &[ManagerReport]) -> Result<String> {
    Ok(serde_json::to_string_pretty(reports)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ManagerId;
    use crate::orchestrator::DefinitionResult;
    use std::path::PathBuf;

    #[test]
    fn test_failed_file_serializes_as_null() {
        let reports = vec![ManagerReport {
            manager: ManagerId::Npm,
            files: vec![DefinitionResult {
                definition_file: PathBuf::from("web/package.json"),
                result: None,
            }],
        }];

        let value: serde_json::Value = serde_json::from_str(&to_json(&reports).unwrap()).unwrap();
        assert_eq!(value[0]["manager"], "Npm");
        assert_eq!(value[0]["files"][0]["definitionFile"], "web/package.json");
        assert!(value[0]["files"][0]["result"].is_null());
    }
}
