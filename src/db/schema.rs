diesel::table! {
    datasets (id) {
        id -> Integer,
        name -> Text,
        ximagesize -> BigInt,
        yimagesize -> BigInt,
        startslice -> BigInt,
        endslice -> BigInt,
        zoomlevels -> Integer,
        zscale -> Double,
        startwindow -> BigInt,
        endwindow -> BigInt,
    }
}

diesel::table! {
    projects (id) {
        id -> Integer,
        token -> Text,
        dbname -> Text,
        backend -> Text,
        dataset -> Text,
        readonly -> Bool,
        exceptions -> Bool,
        resolution -> Integer,
    }
}

diesel::allow_tables_to_appear_in_same_query!(datasets, projects,);
