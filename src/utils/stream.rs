//! Append-only output streams with one bucket per scheduler work item.
//!
//! Every work item owns its bucket exclusively while it runs, so parallel
//! producers never contend. Readers see the buckets in work-item order, which
//! keeps the combined output independent of thread timing.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct WorkItemStream<T> {
    buckets: Vec<Vec<T>>,
}

/// Exclusive writer over a single work item's bucket.
#[derive(Debug)]
pub struct StreamWriter<'a, T> {
    work_item: usize,
    items: &'a mut Vec<T>,
}

impl<T> StreamWriter<'_, T> {
    pub fn work_item(&self) -> usize {
        self.work_item
    }

    pub fn write(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for WorkItemStream<T> {
    fn default() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }
}

impl<T> WorkItemStream<T> {
    pub fn new(num_work_items: usize) -> Self {
        Self {
            buckets: (0..num_work_items).map(|_| Vec::new()).collect(),
        }
    }

    pub fn num_work_items(&self) -> usize {
        self.buckets.len()
    }

    /// Writer for `work_item`. Panics if the index is outside the stream.
    pub fn writer(&mut self, work_item: usize) -> StreamWriter<'_, T> {
        StreamWriter {
            work_item,
            items: &mut self.buckets[work_item],
        }
    }

    /// One writer per work item, in order.
    pub fn writers(&mut self) -> impl Iterator<Item = StreamWriter<'_, T>> {
        self.buckets
            .iter_mut()
            .enumerate()
            .map(|(work_item, items)| StreamWriter { work_item, items })
    }

    /// Items written by `work_item`.
    pub fn read(&self, work_item: usize) -> &[T] {
        self.buckets
            .get(work_item)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All items in work-item order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buckets.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.buckets.into_iter().flatten().collect()
    }
}

#[cfg(feature = "parallel")]
impl<T: Send> WorkItemStream<T> {
    /// Parallel counterpart of [`WorkItemStream::writers`].
    pub fn par_writers(&mut self) -> impl IndexedParallelIterator<Item = StreamWriter<'_, T>> {
        self.buckets
            .par_iter_mut()
            .enumerate()
            .map(|(work_item, items)| StreamWriter { work_item, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_read_in_work_item_order() {
        let mut stream = WorkItemStream::new(3);
        stream.writer(2).write(30);
        stream.writer(0).write(1);
        stream.writer(0).write(2);
        assert_eq!(stream.read(0), &[1, 2]);
        assert!(stream.read(1).is_empty());
        assert_eq!(stream.iter().copied().collect::<Vec<_>>(), vec![1, 2, 30]);
        assert_eq!(stream.len(), 3);
        assert!(stream.read(9).is_empty());
    }
}
