use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

pub mod deserialize {
    use divan::Bencher;
    use unity_assets::ObjectCodec;
    use unity_typetree::{Endianness, TypeNode, TypeTree};

    fn float_array_tree() -> TypeTree {
        let mut tree = TypeTree::new();
        let root = tree.push_child(None, TypeNode::new("Mesh", "Base", -1));
        let mut array = TypeNode::new("Array", "m_Vertices", -1);
        array.is_array = true;
        let array = tree.push_child(Some(root), array);
        tree.push_child(Some(array), TypeNode::new("SInt32", "size", 4));
        tree.push_child(Some(array), TypeNode::new("float", "data", 4));
        tree
    }

    fn byte_array_tree() -> TypeTree {
        let mut tree = TypeTree::new();
        let mut array = TypeNode::new("TypelessData", "image data", -1);
        array.is_array = true;
        let root = tree.push_child(None, array);
        tree.push_child(Some(root), TypeNode::new("SInt32", "size", 4));
        tree.push_child(Some(root), TypeNode::new("UInt8", "data", 1));
        tree
    }

    #[divan::bench]
    fn float_array(bencher: Bencher) {
        let tree = float_array_tree();
        let mut data = Vec::new();
        data.extend_from_slice(&4096i32.to_le_bytes());
        for i in 0..4096 {
            data.extend_from_slice(&(i as f32).to_le_bytes());
        }
        let codec = ObjectCodec::new(Endianness::Little, 15);

        bencher.bench_local(|| divan::black_box(codec.deserialize(&data, &tree).unwrap()));
    }

    #[divan::bench]
    fn byte_array(bencher: Bencher) {
        let tree = byte_array_tree();
        let mut data = Vec::new();
        data.extend_from_slice(&65536i32.to_le_bytes());
        data.resize(4 + 65536, 0xAB);
        let codec = ObjectCodec::new(Endianness::Little, 15);

        bencher.bench_local(|| divan::black_box(codec.deserialize(&data, &tree).unwrap()));
    }
}
