//! 배치 분할 모듈.

/// 한 워커가 한 번에 저장하는 연속 레코드 묶음.
///
/// 생성 이후 변경되지 않으며 정확히 한 워커가 한 번 소비합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    /// 입력 내 배치 순번 (0부터)
    pub index: usize,
    items: Vec<T>,
}

impl<T> Batch<T> {
    /// 배치에 포함된 레코드
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 레코드 목록을 `batch_size` 단위의 연속 배치로 분할합니다.
///
/// 입력 순서를 보존하며 `ceil(N / batch_size)`개의 배치를 만듭니다.
/// 마지막 배치만 `batch_size`보다 짧을 수 있고, 입력이 비어 있으면 배치도 없습니다.
///
/// # Panics
///
/// `batch_size`가 0이면 패닉합니다 (호출자 책임).
pub fn split_into_batches<T>(items: Vec<T>, batch_size: usize) -> Vec<Batch<T>> {
    assert!(batch_size > 0, "batch_size must be greater than zero");

    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut iter = items.into_iter().peekable();
    let mut index = 0;

    while iter.peek().is_some() {
        let chunk: Vec<T> = iter.by_ref().take(batch_size).collect();
        batches.push(Batch {
            index,
            items: chunk,
        });
        index += 1;
    }

    batches
}
