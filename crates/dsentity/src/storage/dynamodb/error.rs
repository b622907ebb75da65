//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `dsentity_core::store`.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use dsentity_core::store::StoreError;

const TABLE_NOT_FOUND: &str = "Table not found";
const THROUGHPUT_EXCEEDED: &str = "Throughput exceeded, please retry";
const REQUEST_LIMIT_EXCEEDED: &str = "Request limit exceeded, please retry";
const INTERNAL_ERROR: &str = "DynamoDB internal server error";

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
    storage_key: &str,
) -> StoreError {
    let failed = |message: &str| StoreError::QueryFailed(message.to_string());
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => failed(TABLE_NOT_FOUND),
        GetItemError::ProvisionedThroughputExceededException(_) => failed(THROUGHPUT_EXCEEDED),
        GetItemError::RequestLimitExceeded(_) => failed(REQUEST_LIMIT_EXCEEDED),
        GetItemError::InternalServerError(_) => failed(INTERNAL_ERROR),
        err => StoreError::QueryFailed(format!("GetItem {storage_key} failed: {err:?}")),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(err: SdkError<QueryError, R>) -> StoreError {
    let failed = |message: &str| StoreError::QueryFailed(message.to_string());
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => failed(TABLE_NOT_FOUND),
        QueryError::ProvisionedThroughputExceededException(_) => failed(THROUGHPUT_EXCEEDED),
        QueryError::RequestLimitExceeded(_) => failed(REQUEST_LIMIT_EXCEEDED),
        QueryError::InternalServerError(_) => failed(INTERNAL_ERROR),
        err => StoreError::QueryFailed(format!("Query failed: {err:?}")),
    }
}

/// Map a PutItem SDK error to StoreError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    storage_key: &str,
) -> StoreError {
    let failed = |message: &str| StoreError::WriteFailed(message.to_string());
    match err.into_service_error() {
        PutItemError::ResourceNotFoundException(_) => failed(TABLE_NOT_FOUND),
        PutItemError::ProvisionedThroughputExceededException(_) => failed(THROUGHPUT_EXCEEDED),
        PutItemError::RequestLimitExceeded(_) => failed(REQUEST_LIMIT_EXCEEDED),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            failed("Item collection size limit exceeded")
        }
        PutItemError::TransactionConflictException(_) => {
            failed("Transaction conflict, please retry")
        }
        PutItemError::InternalServerError(_) => failed(INTERNAL_ERROR),
        err => StoreError::WriteFailed(format!("PutItem {storage_key} failed: {err:?}")),
    }
}

/// Map an UpdateItem SDK error to StoreError.
///
/// UpdateItem only advances id counters, so the message names the counter.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    counter: &str,
) -> StoreError {
    let failed = |message: &str| StoreError::WriteFailed(message.to_string());
    match err.into_service_error() {
        UpdateItemError::ResourceNotFoundException(_) => failed(TABLE_NOT_FOUND),
        UpdateItemError::ProvisionedThroughputExceededException(_) => failed(THROUGHPUT_EXCEEDED),
        UpdateItemError::RequestLimitExceeded(_) => failed(REQUEST_LIMIT_EXCEEDED),
        UpdateItemError::TransactionConflictException(_) => {
            failed("Transaction conflict, please retry")
        }
        UpdateItemError::InternalServerError(_) => failed(INTERNAL_ERROR),
        err => StoreError::WriteFailed(format!("Allocating ids from {counter} failed: {err:?}")),
    }
}

/// Whether a PutItem was rejected by its condition expression.
pub fn put_condition_failed<R>(err: &SdkError<PutItemError, R>) -> bool {
    matches!(
        err.as_service_error(),
        Some(PutItemError::ConditionalCheckFailedException(_))
    )
}

/// Whether an UpdateItem was rejected by its condition expression.
pub fn update_condition_failed<R>(err: &SdkError<UpdateItemError, R>) -> bool {
    matches!(
        err.as_service_error(),
        Some(UpdateItemError::ConditionalCheckFailedException(_))
    )
}

/// Map a DeleteItem SDK error to StoreError.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    storage_key: &str,
) -> StoreError {
    let failed = |message: &str| StoreError::WriteFailed(message.to_string());
    match err.into_service_error() {
        DeleteItemError::ResourceNotFoundException(_) => failed(TABLE_NOT_FOUND),
        DeleteItemError::ProvisionedThroughputExceededException(_) => failed(THROUGHPUT_EXCEEDED),
        DeleteItemError::RequestLimitExceeded(_) => failed(REQUEST_LIMIT_EXCEEDED),
        DeleteItemError::TransactionConflictException(_) => {
            failed("Transaction conflict, please retry")
        }
        DeleteItemError::InternalServerError(_) => failed(INTERNAL_ERROR),
        err => StoreError::WriteFailed(format!("DeleteItem {storage_key} failed: {err:?}")),
    }
}
