mod metadata_mapper_service;

pub use metadata_mapper_service::MetadataMapperService;
