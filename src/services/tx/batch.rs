use crate::infrastructure::provider::NetworkClient;
use crate::log_warn;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::Bytes;
use futures_util::future::join_all;

/// 批量只读调用：按 batch_size 分块，块内并发执行，结果保持输入顺序。
/// 单个调用失败只在对应位置产生 None，不会中断同批的其他调用。
pub async fn batch_call(
    provider: &dyn NetworkClient,
    calls: &[TypedTransaction],
    batch_size: usize,
) -> Vec<Option<Bytes>> {
    let chunk_size = batch_size.max(1);
    let mut results = Vec::with_capacity(calls.len());

    for chunk in calls.chunks(chunk_size) {
        let futures = chunk.iter().map(|tx| provider.call(tx));
        for outcome in join_all(futures).await {
            if let Err(e) = &outcome {
                log_warn!("批量调用第 {} 项失败: {}", results.len(), e);
            }
            results.push(outcome.ok());
        }
    }

    results
}
