//! License check → purchase → download → repackage.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::error::AcquireError;
use super::request::{AcquireRequest, AcquiredArtifact, AcquisitionStage};
use crate::auth::Account;
use crate::catalog::{AppVersion, VersionHistory, versions_from_item};
use crate::download::{ArtifactDownloader, ProgressCallback, artifact_file_name, resolve_output_path};
use crate::package::{PackageMetadata, repackage};
use crate::session::StoreSession;
use crate::store::{DownloadResponse, PurchaseResponse, StoreClient, StoreError, StoreItem};

/// Drives acquisitions for signed-in identities.
#[derive(Debug, Clone)]
pub struct Acquirer {
    session: Arc<StoreSession>,
    client: StoreClient,
    downloader: ArtifactDownloader,
}

impl Acquirer {
    #[must_use]
    pub fn new(
        session: Arc<StoreSession>,
        client: StoreClient,
        downloader: ArtifactDownloader,
    ) -> Self {
        Self {
            session,
            client,
            downloader,
        }
    }

    /// Fetches the artifact for `request` on behalf of `account`.
    ///
    /// When the identity holds no license and `purchase_if_needed` is set,
    /// one purchase is made and the license check is repeated once; a second
    /// failure is returned as-is. The output file of a failed acquisition is
    /// left in an unspecified state.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing stage, unchanged.
    #[instrument(skip(self, account, on_progress), fields(catalog_id = %request.catalog_id, dsid = %account.dsid))]
    pub async fn acquire(
        &self,
        request: &AcquireRequest,
        account: &Account,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<AcquiredArtifact, AcquireError> {
        let (item, purchased) = {
            let _identity = self.session.activate(&account.cookies).await;
            self.licensed_item(request, account)
                .await
                .inspect_err(|error| failed(AcquisitionStage::CheckingLicense, error))?
        };

        enter(AcquisitionStage::Downloading);
        let metadata = &item.metadata;
        let default_name = artifact_file_name(
            &metadata.bundle_display_name,
            &metadata.bundle_short_version_string,
        );
        let path = resolve_output_path(request.output_path.as_deref(), &default_name);
        let outcome = self
            .downloader
            .stream(&item.url, &path, on_progress)
            .await
            .inspect_err(|error| failed(AcquisitionStage::Downloading, error))?;

        enter(AcquisitionStage::Repackaging);
        let package_metadata =
            PackageMetadata::from_item(&request.catalog_id, &item, &account.region.storefront);
        repackage(&outcome.path, &package_metadata)
            .await
            .inspect_err(|error| failed(AcquisitionStage::Repackaging, error))?;

        enter(AcquisitionStage::Done);
        info!(
            path = %outcome.path.display(),
            bytes = outcome.bytes_downloaded,
            purchased,
            "acquisition complete"
        );
        Ok(AcquiredArtifact {
            path: outcome.path,
            item,
            purchased,
            bytes_downloaded: outcome.bytes_downloaded,
        })
    }

    /// Runs the license check, with a single purchase-and-retry when allowed.
    /// The caller holds the identity slot.
    async fn licensed_item(
        &self,
        request: &AcquireRequest,
        account: &Account,
    ) -> Result<(StoreItem, bool), StoreError> {
        let credentials = account.credentials();
        let version = request.version_id.as_deref();

        enter(AcquisitionStage::CheckingLicense);
        let first = self
            .client
            .check_license_and_download(&self.session, &credentials, &request.catalog_id, version)
            .await;

        match first {
            Ok(response) => Ok((first_item(response)?, false)),
            Err(StoreError::InvalidLicense) if request.purchase_if_needed => {
                enter(AcquisitionStage::Purchasing);
                self.client
                    .purchase(&self.session, &credentials, &request.catalog_id)
                    .await?;

                enter(AcquisitionStage::CheckingLicense);
                let response = self
                    .client
                    .check_license_and_download(
                        &self.session,
                        &credentials,
                        &request.catalog_id,
                        version,
                    )
                    .await?;
                Ok((first_item(response)?, true))
            }
            Err(error) => Err(error),
        }
    }

    /// Acquires a license for `catalog_id` without downloading.
    ///
    /// # Errors
    ///
    /// Returns the classified purchase failure.
    #[instrument(skip(self, account), fields(dsid = %account.dsid))]
    pub async fn purchase(
        &self,
        account: &Account,
        catalog_id: &str,
    ) -> Result<PurchaseResponse, StoreError> {
        let _identity = self.session.activate(&account.cookies).await;
        let response = self
            .client
            .purchase(&self.session, &account.credentials(), catalog_id)
            .await?;
        info!(catalog_id, "license acquired");
        Ok(response)
    }

    /// Returns the artifact descriptor for `catalog_id` without downloading.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidLicense`] when the identity holds no
    /// license, and the classified failure otherwise.
    #[instrument(skip(self, account), fields(dsid = %account.dsid))]
    pub async fn item_info(
        &self,
        account: &Account,
        catalog_id: &str,
        version_id: Option<&str>,
    ) -> Result<StoreItem, StoreError> {
        let _identity = self.session.activate(&account.cookies).await;
        let response = self
            .client
            .check_license_and_download(
                &self.session,
                &account.credentials(),
                catalog_id,
                version_id,
            )
            .await?;
        first_item(response)
    }

    /// Lists downloadable versions of `catalog_id`, newest first.
    ///
    /// The version history index is consulted first; when it has nothing,
    /// the versions named by the current artifact descriptor are returned.
    ///
    /// # Errors
    ///
    /// Returns the storefront failure of the descriptor fallback.
    #[instrument(skip(self, history, account), fields(dsid = %account.dsid))]
    pub async fn list_versions(
        &self,
        history: &VersionHistory,
        account: &Account,
        catalog_id: &str,
    ) -> Result<Vec<AppVersion>, StoreError> {
        if let Some(versions) = history.fetch(catalog_id).await {
            return Ok(versions);
        }
        debug!("version history empty; using artifact descriptor");
        let item = self.item_info(account, catalog_id, None).await?;
        Ok(versions_from_item(&item))
    }
}

fn first_item(response: DownloadResponse) -> Result<StoreItem, StoreError> {
    response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::invalid_item("license check returned no artifacts"))
}

fn enter(stage: AcquisitionStage) {
    debug!(%stage, "acquisition stage");
}

fn failed(stage: AcquisitionStage, error: &dyn std::fmt::Display) {
    warn!(%stage, error = %error, "acquisition failed");
}
