use anyhow::Result;

use crate::domain::RecordKind;

use super::super::Container;

pub struct VerifyController<'a> {
    container: &'a Container,
}

impl<'a> VerifyController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn verify(&self) -> Result<String> {
        self.container
            .prepare_use_case()
            .execute(self.container.init_databases())
            .await?;

        let repo = self.container.vector_repo();
        let mut output = "Destination ready\n".to_string();
        for kind in [RecordKind::Session, RecordKind::Speaker] {
            output.push_str(&format!(
                "  {}: {} {}\n",
                repo.target_name(kind),
                repo.count(kind).await?,
                kind.plural()
            ));
        }

        Ok(output.trim_end().to_string())
    }
}
