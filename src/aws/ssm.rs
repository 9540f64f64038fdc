use crate::aws::ParameterStore;
use crate::aws::sdk_error;
use crate::error::Error;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use aws_sdk_ssm::types::ParameterType;

pub struct SsmStore {
    client: Client,
}

impl SsmStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(Client::new(sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterStore for SsmStore {
    fn provider_name(&self) -> &'static str {
        "ssm"
    }

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        let result = self
            .client
            .get_parameter()
            .name(key)
            .with_decryption(false)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            // Only ParameterNotFound means absent. Throttling, access
            // denied and transport failures all land in the other arm.
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetParameterError::is_parameter_not_found) =>
            {
                Ok(false)
            }
            Err(err) => Err(Error::Store(sdk_error(err))),
        }
    }

    async fn put(&self, key: &str, value: &str, overwrite: bool) -> Result<(), Error> {
        self.client
            .put_parameter()
            .name(key)
            .value(value)
            .overwrite(overwrite)
            .r#type(ParameterType::String)
            .send()
            .await
            .map_err(|err| Error::Store(sdk_error(err)))?;

        tracing::debug!(%key, overwrite, "SSM: parameter set");
        Ok(())
    }
}
