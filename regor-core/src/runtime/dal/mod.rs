mod execution_dao_facade;

pub use execution_dao_facade::ExecutionDaoFacade;
