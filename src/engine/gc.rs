use super::*;

/// Bytes in front of every inline block: owner id, then data length.
pub(crate) const INLINE_HEADER_SIZE: usize = 16;

const BLOCK_ALIGN: usize = 8;

fn block_size(data_len: usize) -> usize {
    INLINE_HEADER_SIZE + data_len.div_ceil(BLOCK_ALIGN) * BLOCK_ALIGN
}

/// Arena holding the bytes of every inline buffer. Blocks are addressed by
/// their offset, which changes whenever the arena is compacted.
#[derive(Default, Debug)]
pub(crate) struct InlineHeap {
    bytes: Vec<u8>,
}

impl InlineHeap {
    pub(crate) fn allocate(&mut self, owner: u64, data_len: usize) -> usize {
        let block = self.bytes.len();
        self.bytes.extend_from_slice(&owner.to_le_bytes());
        self.bytes.extend_from_slice(&(data_len as u64).to_le_bytes());
        self.bytes.resize(block + block_size(data_len), 0);
        block
    }

    fn header(&self, block: usize) -> (u64, usize) {
        let mut owner = [0u8; 8];
        let mut len = [0u8; 8];
        owner.copy_from_slice(&self.bytes[block..block + 8]);
        len.copy_from_slice(&self.bytes[block + 8..block + INLINE_HEADER_SIZE]);
        (u64::from_le_bytes(owner), u64::from_le_bytes(len) as usize)
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl Engine {
    pub(crate) fn allocate_object_slot(&mut self, obj: Rc<RefCell<JsObjectData>>) -> u64 {
        self.maybe_gc();
        self.gc_alloc_count += 1;
        let idx = self.objects.len();
        self.objects.push(Some(obj.clone()));
        let id = idx as u64;
        obj.borrow_mut().id = Some(id);
        id
    }

    pub(crate) fn maybe_gc(&mut self) {
        if self.gc_alloc_count < self.config.gc_threshold {
            return;
        }
        self.gc_alloc_count = 0;
        self.collect_garbage();
    }

    fn inline_block_is_live(&self, owner: u64, block: usize) -> bool {
        self.get_object(owner).is_some_and(|obj| {
            matches!(
                obj.borrow().arraybuffer_data.as_ref().map(|b| &b.store),
                Some(BackingStore::Inline { block: b }) if *b == block
            )
        })
    }

    fn relocate_inline_block(&mut self, owner: u64, to: usize) {
        if let Some(obj) = self.get_object(owner)
            && let Some(ref mut buf) = obj.borrow_mut().arraybuffer_data
        {
            buf.store = BackingStore::Inline { block: to };
        }
    }

    /// Slides every live inline block down over the dead ones. Any inline
    /// data address computed before this call is stale afterwards.
    pub fn collect_garbage(&mut self) {
        let end = self.inline_heap.len();
        let mut read = 0;
        let mut write = 0;
        let mut moved = 0usize;
        let mut reclaimed = 0usize;
        while read < end {
            let (owner, data_len) = self.inline_heap.header(read);
            let size = block_size(data_len);
            if self.inline_block_is_live(owner, read) {
                if read != write {
                    self.inline_heap
                        .bytes
                        .copy_within(read..read + size, write);
                    self.relocate_inline_block(owner, write);
                    moved += 1;
                }
                write += size;
            } else {
                reclaimed += size;
            }
            read += size;
        }
        self.inline_heap.bytes.truncate(write);
        tracing::debug!(
            moved,
            reclaimed_bytes = reclaimed,
            heap_bytes = write,
            "inline heap compacted"
        );
    }

    pub fn inline_heap_size(&self) -> usize {
        self.inline_heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_aligned() {
        let mut heap = InlineHeap::default();
        let a = heap.allocate(1, 3);
        let b = heap.allocate(2, 9);
        assert_eq!(a, 0);
        assert_eq!(b, INLINE_HEADER_SIZE + 8);
        assert_eq!(heap.header(b), (2, 9));
        assert_eq!(heap.len(), b + INLINE_HEADER_SIZE + 16);
    }

    #[test]
    fn collection_without_inline_buffers_is_a_no_op() {
        let mut engine = Engine::new();
        engine.collect_garbage();
        assert_eq!(engine.inline_heap_size(), 0);
    }

    #[test]
    fn frequent_collections_keep_inline_views_intact() {
        let mut engine = Engine::with_config(EngineConfig::default().with_gc_threshold(1));
        let ctor = engine.typed_array_constructor(ElementKind::Int16);
        let mut kept = Vec::new();
        for i in 0..8 {
            let items = [JsValue::Number(f64::from(i)), JsValue::Number(-f64::from(i))];
            let view = engine.typed_array_of(&ctor, &items).unwrap();
            if i % 2 == 0 {
                let buffer = engine.typed_array_buffer(&view).unwrap();
                engine.detach_array_buffer(&buffer).unwrap();
            } else {
                kept.push((i, view));
            }
        }
        engine.collect_garbage();
        for (i, view) in &kept {
            assert_eq!(
                engine.typed_array_to_vec(view),
                vec![Element::Number(f64::from(*i)), Element::Number(-f64::from(*i))]
            );
        }
    }
}
