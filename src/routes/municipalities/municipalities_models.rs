use crate::models::import_batch::ImportBatch;
use crate::models::municipality::MunicipalitySummary;
use crate::models::scrape_run::ScrapeRun;
use crate::routes::common::ListResponse;

pub type ListMunicipalitiesResponse = ListResponse<MunicipalitySummary>;
pub type ListScrapeRunsResponse = ListResponse<ScrapeRun>;
pub type ListImportBatchesResponse = ListResponse<ImportBatch>;
